mod classic;
pub use classic::ClassicDisplay;

use clap::Parser;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
    Csv,
    None,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = "Ping utility over a raw IPv4 socket", author, name = "rawping")]
#[command(disable_help_flag = true)]
pub struct Args {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Address or name of target host
    #[arg()]
    pub target: String,

    /// Format of the statistics printed on exit
    #[arg(long, default_value = "text")]
    pub summary: SummaryFormat,

    /// Print help
    #[arg(short = 'h', long, short_alias = '?', action = clap::ArgAction::Help)]
    pub help: Option<bool>,
}

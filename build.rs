use clap::CommandFactory;
use clap_complete::{
    generate_to,
    shells::{Bash, Fish, Zsh},
};

#[cfg(unix)]
include!("src/args.rs");

#[cfg(unix)]
fn generate_completions() -> std::io::Result<()> {
    let Some(out_dir) = std::env::var_os("OUT_DIR") else {
        return Ok(());
    };
    let mut cmd = Args::command();
    generate_to(Bash, &mut cmd, "rawping", &out_dir)?;
    generate_to(Fish, &mut cmd, "rawping", &out_dir)?;
    generate_to(Zsh, &mut cmd, "rawping", &out_dir)?;
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=src/args.rs");
    #[cfg(unix)]
    if let Err(err) = generate_completions() {
        println!("cargo:warning=cannot generate shell completions: {}", err);
    }
}

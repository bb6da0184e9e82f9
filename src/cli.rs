use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashforge")]
#[command(author, version, about = "Packages local and remote media presentations into MPEG-DASH, served over HTTP")]
pub struct Cli {
    /// Path to a TOML config file. Defaults to the usual search path.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override `server.host` from the config file.
    #[arg(long)]
    pub host: Option<String>,

    /// Override `server.port` from the config file.
    #[arg(long)]
    pub port: Option<u16>,
}

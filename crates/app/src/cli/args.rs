pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peerchat")]
#[command(about = "Peer-to-peer terminal chat")]
pub struct Args {
    /// Path to the config file (defaults to ~/.peerchat/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}

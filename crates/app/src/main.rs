mod cli;
mod config;
mod input;
mod process;
mod render;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Chat, Identity, Init, Version};

command_enum! {
    (Chat, Chat),
    (Identity, Identity),
    (Init, Init),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = match cli::op::OpContext::new(args.config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

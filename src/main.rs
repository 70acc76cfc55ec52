use anyhow::Result;
use clap::Parser;

mod admin;
mod cli;
mod commands;
mod config;
mod providers;
mod watch;

use cli::{Args, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        // Logging waits for the config so its level applies
        Commands::Start => commands::start(&args.config, args.verbose),
        Commands::Init { output, force } => {
            commands::init_logging(args.verbose, None);
            commands::init(output.as_deref().unwrap_or(&args.config), force)
        }
        Commands::CheckConfig => {
            commands::init_logging(args.verbose, None);
            commands::check_config(&args.config)
        }
        Commands::Status { api } => {
            commands::init_logging(args.verbose, None);
            commands::status(api, &args.config)
        }
        Commands::Reset { ip, api } => {
            commands::init_logging(args.verbose, None);
            commands::reset(&ip, api, &args.config)
        }
    }
}

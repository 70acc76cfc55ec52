use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// DNS watch-time limiter
///
/// Reads the Pi-hole query log, turns video domain lookups into daily
/// watch time per device, and blocks devices that exceed their budget.
#[derive(Parser, Debug)]
#[command(name = "family-dns-limiter")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the limiter in the foreground until Ctrl+C
    Start,
    /// Write a commented example configuration
    Init {
        /// Where to write it (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration and print a summary
    CheckConfig,
    /// Show today's stats from a running daemon
    Status {
        /// Admin API base URL (defaults to the configured listen address)
        #[arg(long)]
        api: Option<String>,
    },
    /// Lift a device's block and clear its stats for today
    Reset {
        /// Device IP address
        ip: String,

        /// Admin API base URL (defaults to the configured listen address)
        #[arg(long)]
        api: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["family-dns-limiter", "status", "--config", "/tmp/c.yaml", "-v"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/tmp/c.yaml"));
        assert!(args.verbose);
        assert!(matches!(args.command, Commands::Status { api: None }));
    }

    #[test]
    fn test_reset_takes_ip_and_api() {
        let args =
            Args::try_parse_from(["family-dns-limiter", "reset", "10.0.0.5", "--api", "http://pi:8081"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match args.command {
            Commands::Reset { ip, api } => {
                assert_eq!(ip, "10.0.0.5");
                assert_eq!(api.as_deref(), Some("http://pi:8081"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["family-dns-limiter"]).is_err());
    }
}

//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand};

/// Client for the com.coreos.update1 update manager
#[derive(Parser, Debug)]
#[command(name = "update1ctl")]
#[command(about = "Query and drive the update check daemon over the system bus", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Show the current update status
    Status {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Reset the status to idle
    Reset,

    /// Request an update check now
    Check,

    /// Print every StatusUpdate signal until interrupted
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json_flag() {
        let cli = Cli::parse_from(["update1ctl", "status", "--json"]);
        assert_eq!(cli.command, Commands::Status { json: true });
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["update1ctl"]).is_err());
    }

    #[test]
    fn test_check_and_reset() {
        assert_eq!(Cli::parse_from(["update1ctl", "check"]).command, Commands::Check);
        assert_eq!(Cli::parse_from(["update1ctl", "reset"]).command, Commands::Reset);
    }
}

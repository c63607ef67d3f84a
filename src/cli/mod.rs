//! CLI module for Demeter
//!
//! Provides the server entry command:
//! - `serve`: start the control plane server

use clap::{Parser, Subcommand};

/// Demeter control plane CLI
#[derive(Parser, Debug)]
#[command(name = "demeter")]
#[command(about = "Build and deploy orchestration control plane")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Bind address override
        #[arg(long)]
        host: Option<String>,
        /// Fixed port override
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve { host, port }) => demeter_server::run(host, port).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_serve_accepts_overrides() {
        let cli = Cli::parse_from(["demeter", "serve", "--host", "0.0.0.0", "--port", "8431"]);
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8431));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::parse_from(["demeter"]);
        assert!(cli.command.is_none());
    }
}

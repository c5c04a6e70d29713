//! CLI interface for Schoolhouse

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "schoolhouse")]
#[command(version)]
#[command(about = "School administration backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default schoolhouse.toml configuration file
    Init,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to listen on (defaults to the configured port)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Apply the database schema and make sure a principal exists
    Migrate,

    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Manage website page content
    Content {
        #[command(subcommand)]
        action: ContentAction,
    },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// List administrator accounts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Set a new password for an administrator
    ResetPassword {
        /// Username of the account
        username: String,

        /// The new password
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum ContentAction {
    /// List pages that have content sections
    Pages,

    /// Replace a page with its bundled default sections
    Seed {
        /// Page slug to seed
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        page: Option<String>,

        /// Seed every page that ships default content
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_seed_requires_page_or_all() {
        assert!(Cli::try_parse_from(["schoolhouse", "content", "seed"]).is_err());
        assert!(Cli::try_parse_from(["schoolhouse", "content", "seed", "about", "--all"]).is_err());

        let cli = Cli::try_parse_from(["schoolhouse", "content", "seed", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Content {
                action: ContentAction::Seed { page: None, all: true }
            }
        ));
    }

    #[test]
    fn test_reset_password_args() {
        let cli = Cli::try_parse_from([
            "schoolhouse",
            "admin",
            "reset-password",
            "principal",
            "--password",
            "n3w-secret",
        ])
        .unwrap();
        match cli.command {
            Commands::Admin {
                action: AdminAction::ResetPassword { username, password },
            } => {
                assert_eq!(username, "principal");
                assert_eq!(password, "n3w-secret");
            }
            _ => panic!("expected admin reset-password"),
        }
    }
}

//! Command-line interface definitions.
//!
//! Defines the operator CLI using `clap`: `watch` streams daemon events and
//! health lines, `check` validates configuration without connecting.

pub mod check;
pub mod output;
pub mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time link to the agent daemon.
#[derive(Parser, Debug)]
#[command(name = "daemon-link")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and stream events until interrupted
    Watch(WatchArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `daemon-link check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration file
    Config(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `watch` subcommand.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Coordination to join after connecting (repeatable)
    #[arg(long = "coordination", value_name = "ID")]
    pub coordinations: Vec<String>,

    /// Session to subscribe to after connecting (repeatable)
    #[arg(long = "session", value_name = "ID")]
    pub sessions: Vec<String>,

    /// Seconds between health lines
    #[arg(long, default_value = "10")]
    pub health_interval: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
        assert_eq!(Cli::command().get_name(), "daemon-link");
    }

    #[test]
    fn watch_defaults() {
        let cli = Cli::try_parse_from(["daemon-link", "watch"]).unwrap();
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(args.coordinations.is_empty());
        assert!(args.sessions.is_empty());
        assert_eq!(args.health_interval, 10);
    }

    #[test]
    fn watch_accepts_repeated_ids() {
        let cli = Cli::try_parse_from([
            "daemon-link",
            "watch",
            "--coordination",
            "c1",
            "--coordination",
            "c2",
            "--session",
            "s1",
            "-c",
            "local.toml",
        ])
        .unwrap();
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.coordinations, vec!["c1", "c2"]);
        assert_eq!(args.sessions, vec!["s1"]);
        assert_eq!(args.config, PathBuf::from("local.toml"));
    }

    #[test]
    fn check_config_parses() {
        let cli =
            Cli::try_parse_from(["daemon-link", "check", "config", "--config", "x.toml"]).unwrap();
        match cli.command {
            Commands::Check(CheckCommand::Config(arg)) => {
                assert_eq!(arg.config, PathBuf::from("x.toml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "glasslink",
    version,
    about = "Drive both lenses of a pair of BLE smart glasses"
)]
pub struct Cli {
    /// Path to config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log frame traffic and other debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append logs to this file instead of the default one
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and keep both lenses alive until Ctrl+C (default)
    Run,

    /// Show text on both lenses, then disconnect
    Send {
        /// Text to display; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show a 1-bit BMP image on both lenses, then disconnect
    Image {
        /// Path to the BMP file
        path: PathBuf,
    },

    /// Scan once and print the lenses found
    Scan,

    /// Write a default config file (does not overwrite unless --force)
    InitConfig {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the resolved config file path
    PrintConfigPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_joins_words() {
        let cli = Cli::parse_from(["glasslink", "-v", "send", "hello", "there"]);
        assert!(cli.verbose);
        match cli.command {
            Some(Command::Send { text }) => assert_eq!(text.join(" "), "hello there"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["glasslink", "--config", "/tmp/g.toml"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/g.toml")));
        assert_eq!(cli.log_file, None);
    }

    #[test]
    fn test_log_file_after_subcommand() {
        let cli = Cli::parse_from(["glasslink", "scan", "--log-file", "/tmp/g.log"]);
        assert!(matches!(cli.command, Some(Command::Scan)));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/g.log")));
    }
}

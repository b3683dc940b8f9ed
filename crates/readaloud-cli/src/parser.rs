//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Read selected text aloud through a streaming text-to-speech backend.
#[derive(Parser)]
#[command(name = "readaloud")]
#[command(about = "Read text aloud with streaming text-to-speech")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["readaloud", "speak", "-v", "hello"]);
        assert!(cli.verbose);
        assert_eq!(cli.default_log_filter(), "debug");

        let cli = Cli::parse_from(["readaloud", "config"]);
        assert!(!cli.verbose);
        assert_eq!(cli.default_log_filter(), "warn");
    }
}

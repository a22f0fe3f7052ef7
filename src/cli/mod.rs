//! CLI definitions and handlers

mod analyze;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Repotoire signals - fused graph, history and health signals
#[derive(Parser, Debug)]
#[command(name = "repotoire-signals")]
#[command(
    version,
    about = "Fuse dependency-graph topology, git history and scanner metrics into risk and health signals",
    after_help = "\
Examples:
  repotoire-signals . --metrics metrics.json                 Analyze current directory
  repotoire-signals . --metrics m.json --semantics s.json    With semantic classifications
  repotoire-signals . --metrics m.json --format flat         One record per signal
  repotoire-signals . --metrics m.json --no-git              Skip history mining"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Per-file scanner metrics (JSON array)
    #[arg(long, short = 'm')]
    pub metrics: PathBuf,

    /// Per-file semantic classifications (JSON object keyed by path)
    #[arg(long, short = 's')]
    pub semantics: Option<PathBuf>,

    /// Skip git history mining
    #[arg(long)]
    pub no_git: bool,

    /// Output format: json (nested field) or flat (sorted records)
    #[arg(long, short = 'f', default_value = "json", value_parser = ["json", "flat"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64)
    #[arg(long, default_value = "8", value_parser = parse_workers)]
    pub workers: usize,
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    analyze::run(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["repotoire-signals", "--metrics", "m.json"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.format, "json");
        assert!(!cli.no_git);
        assert!(Cli::try_parse_from(["repotoire-signals", "--metrics", "m.json", "--format", "xml"]).is_err());
    }
}

//! Analyze command implementation
//!
//! 1. Load scanner metrics and optional semantic classifications
//! 2. Load and validate `signals.toml`
//! 3. Run graph, history and fusion stages
//! 4. Write the signal field (nested JSON or flat records)

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use repotoire_signals::config::load_analysis_config;
use repotoire_signals::models::{FileMetrics, SemanticInputs};
use repotoire_signals::pipeline;
use repotoire_signals::signals::{initialize_registry, SignalField};

use super::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let path = cli
        .path
        .canonicalize()
        .with_context(|| format!("Repository path does not exist: {}", cli.path.display()))?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.workers)
        .build_global()
        .context("Failed to configure worker pool")?;

    let files = load_metrics(&cli.metrics)?;
    let semantics = match &cli.semantics {
        Some(p) => load_semantics(p)?,
        None => BTreeMap::new(),
    };

    let config = load_analysis_config(&path);
    config.validate().context("Invalid signals.toml")?;

    let field = pipeline::run(&path, &files, &semantics, &config, !cli.no_git)
        .context("Signal registry failed validation")?;

    let output = render(&field, &cli.format)?;
    match &cli.output {
        Some(out) => {
            std::fs::write(out, output)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Signals written to {}", out.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

fn load_metrics(path: &Path) -> Result<Vec<FileMetrics>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse metrics in {}", path.display()))
}

fn load_semantics(path: &Path) -> Result<BTreeMap<String, SemanticInputs>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read semantics from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse semantics in {}", path.display()))
}

fn render(field: &SignalField, format: &str) -> Result<String> {
    let json = match format {
        "flat" => {
            let registry = initialize_registry()?;
            serde_json::to_string_pretty(&field.flatten(registry))
        }
        _ => serde_json::to_string_pretty(field),
    };
    json.context("Failed to serialize signal field")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_inputs() {
        let dir = tempdir().unwrap();
        let metrics = dir.path().join("metrics.json");
        std::fs::write(
            &metrics,
            r#"[{"path": "a.py", "lines": 40, "imports": [{"name": "b", "resolved": "b.py"}]},
                {"path": "b.py"}]"#,
        )
        .unwrap();
        let files = load_metrics(&metrics).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].resolved_imports().collect::<Vec<_>>(), vec!["b.py"]);

        let semantics = dir.path().join("semantics.json");
        std::fs::write(&semantics, r#"{"a.py": {"role": "entry_point"}}"#).unwrap();
        let sem = load_semantics(&semantics).unwrap();
        assert_eq!(sem["a.py"].role, repotoire_signals::models::Role::EntryPoint);

        assert!(load_metrics(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_render_formats() {
        let field = SignalField::new(0);
        let nested = render(&field, "json").unwrap();
        assert!(nested.contains("\"per_file\""));
        let flat = render(&field, "flat").unwrap();
        assert!(flat.contains("\"codebase_health\""));
    }
}

//! Core check logic shared by the CLI and the editor session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checker::PinChecker;
use crate::parser::parse_config;
use crate::pinouts::{BoardQuery, PinoutError, PinoutResolver, PinoutSourceConfig};
use crate::report::CheckResult;

#[derive(Debug, thiserror::Error)]
pub enum PinGuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pinout error: {0}")]
    Pinouts(#[from] PinoutError),
    #[error("{0}")]
    Other(String),
}

/// Options for check runs.
#[derive(Clone, Debug, Default)]
pub struct CheckOptions {
    /// Where board layouts come from.
    pub pinouts: PinoutSourceConfig,
    /// Drop files that are not ESPHome configs from project results.
    pub configs_only: bool,
}

impl CheckOptions {
    pub fn resolver(&self) -> Result<Arc<PinoutResolver>, PinGuardError> {
        let source = self.pinouts.build()?;
        Ok(Arc::new(PinoutResolver::new(source)))
    }
}

/// Directory names never descended into during discovery.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "build", ".esphome"];

pub fn is_config_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Recursively discover YAML files in a directory, sorted.
pub fn discover_config_files(dir: &Path) -> Result<Vec<PathBuf>, PinGuardError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<(), PinGuardError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name) {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() && is_config_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Core check API used by the CLI and the session.
pub struct PinGuardCore;

impl PinGuardCore {
    /// Parse, resolve and check one buffer. `file` is only used for reporting.
    pub async fn check_text(text: &str, file: &str, resolver: &PinoutResolver) -> CheckResult {
        let config = parse_config(text);
        if !config.ok {
            tracing::debug!("{} skipped: {}", file, config.reason.as_deref().unwrap_or(""));
            return CheckResult::skipped(file, config);
        }

        let layout = resolver.resolve(&BoardQuery::from_config(&config)).await;
        let assessments = PinChecker::new(&layout.definition).check(&config);
        let result = CheckResult::new(file, config, &layout.definition, &assessments);

        tracing::debug!(
            file,
            layout = layout.definition.display_name(),
            step = ?layout.step,
            findings = result.findings.len(),
            "checked config"
        );
        result
    }

    pub async fn check_path(path: &Path, resolver: &PinoutResolver) -> Result<CheckResult, PinGuardError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::check_text(&text, &path.display().to_string(), resolver).await)
    }

    /// Check a single config file.
    pub async fn check_file(path: &Path, options: CheckOptions) -> Result<CheckResult, PinGuardError> {
        let resolver = options.resolver()?;
        Self::check_path(path, &resolver).await
    }

    /// Check every YAML file under `dir` against one shared resolver.
    pub async fn check_project(dir: &Path, options: CheckOptions) -> Result<Vec<CheckResult>, PinGuardError> {
        if !dir.is_dir() {
            return Err(PinGuardError::Other(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let files = discover_config_files(dir)?;
        tracing::info!("found {} YAML files under {}", files.len(), dir.display());

        let resolver = options.resolver()?;
        let mut results = Vec::with_capacity(files.len());
        for path in files {
            let result = Self::check_path(&path, &resolver).await?;
            if options.configs_only && !result.is_config() {
                continue;
            }
            results.push(result);
        }
        Ok(results)
    }
}

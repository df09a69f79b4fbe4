//! Deterministic pinout tree rendering and drift checking.
//!
//! A tree is `index.json`, one file per SoC under `soc/`, one per board under
//! `boards/`, and `generated-manifest.json` listing every managed file
//! (itself included). Rendering the same catalog with the same timestamp
//! always yields byte-identical files, so a checked-in tree can be verified
//! by regenerating it and comparing hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pinouts::catalog::{board_path, soc_path, Catalog};
use crate::pinouts::schema::BoardDefinition;
use crate::pinouts::PinoutError;

pub const INDEX_FILE: &str = "index.json";
pub const MANIFEST_FILE: &str = "generated-manifest.json";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Subdirectories owned by the generator; cleared before every write.
const MANAGED_DIRS: &[&str] = &["soc", "boards"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub managed_files: Vec<String>,
}

/// Every file of a tree, keyed by `/`-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTree {
    pub files: BTreeMap<String, String>,
    pub manifest: Manifest,
}

impl RenderedTree {
    pub fn managed_files(&self) -> &[String] {
        &self.manifest.managed_files
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Missing managed file during check: {0}")]
    MissingFile(String),

    #[error("Managed file drift detected: {0}")]
    Drift(String),

    #[error("Generated manifest is missing or invalid: {0}")]
    ManifestInvalid(String),

    #[error("Managed file list mismatch between generated output and manifest: {0}")]
    ManifestMismatch(String),

    #[error(transparent)]
    Render(#[from] PinoutError),
}

/// Pretty JSON, two-space indent, trailing newline.
fn to_json<T: Serialize>(value: &T) -> Result<String, PinoutError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

pub fn render_tree(catalog: &Catalog, generated_at: DateTime<Utc>) -> Result<RenderedTree, PinoutError> {
    let mut files = BTreeMap::new();

    files.insert(INDEX_FILE.to_string(), to_json(&catalog.index())?);

    for (id, grid) in &catalog.socs {
        let def = BoardDefinition::SocGrid(grid.clone());
        files.insert(soc_path(id), to_json(&def)?);
    }

    for (id, board) in &catalog.boards {
        files.insert(board_path(id), to_json(board)?);
    }

    let mut managed_files: Vec<String> = files.keys().cloned().collect();
    managed_files.push(MANIFEST_FILE.to_string());
    managed_files.sort();

    let manifest = Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        generated_at,
        managed_files,
    };
    files.insert(MANIFEST_FILE.to_string(), to_json(&manifest)?);

    tracing::debug!(files = files.len(), "rendered pinout tree");
    Ok(RenderedTree { files, manifest })
}

fn io_error(path: &Path, source: std::io::Error) -> PinoutError {
    PinoutError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Replace the managed part of the tree under `root` with `tree`.
pub fn write_tree(tree: &RenderedTree, root: &Path) -> Result<Vec<PathBuf>, PinoutError> {
    for dir in MANAGED_DIRS {
        let path = root.join(dir);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&path, e)),
        }
    }

    let mut written = Vec::with_capacity(tree.files.len());
    for (rel, content) in &tree.files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        std::fs::write(&path, content).map_err(|e| io_error(&path, e))?;
        written.push(path);
    }

    tracing::info!("wrote {} pinout files to {}", written.len(), root.display());
    Ok(written)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Check the tree under `root` against a fresh render of `catalog`.
///
/// The render reuses the on-disk manifest's `generatedAt`, so only content
/// changes count as drift.
pub fn verify_tree(catalog: &Catalog, root: &Path) -> Result<RenderedTree, VerifyError> {
    let manifest_path = root.join(MANIFEST_FILE);
    let manifest_text = std::fs::read_to_string(&manifest_path)
        .map_err(|e| VerifyError::ManifestInvalid(format!("{}: {}", manifest_path.display(), e)))?;
    let on_disk: Manifest = serde_json::from_str(&manifest_text)
        .map_err(|e| VerifyError::ManifestInvalid(format!("{}: {}", manifest_path.display(), e)))?;

    let expected = render_tree(catalog, on_disk.generated_at)?;

    let mut actual = on_disk.managed_files.clone();
    actual.sort();
    let wanted = expected.managed_files();
    if actual.len() != wanted.len() {
        return Err(VerifyError::ManifestMismatch(format!(
            "expected {} files, manifest lists {}",
            wanted.len(),
            actual.len()
        )));
    }
    if let Some((want, got)) = wanted.iter().zip(&actual).find(|(w, a)| w != a) {
        return Err(VerifyError::ManifestMismatch(format!(
            "expected {}, manifest lists {}",
            want, got
        )));
    }

    for rel in wanted {
        let Some(content) = expected.files.get(rel) else {
            return Err(VerifyError::MissingFile(rel.clone()));
        };
        let on_disk = match std::fs::read(root.join(rel)) {
            Ok(bytes) => bytes,
            Err(_) => return Err(VerifyError::MissingFile(rel.clone())),
        };
        if sha256_hex(&on_disk) != sha256_hex(content.as_bytes()) {
            return Err(VerifyError::Drift(rel.clone()));
        }
    }

    tracing::info!("pinout tree at {} is up to date", root.display());
    Ok(expected)
}

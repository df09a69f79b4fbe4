//! Pinout Knowledge Base
//!
//! Board layouts and pin hazard rules, looked up by the board identity a
//! config declares.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  render   ┌──────────────┐  fetch   ┌──────────────┐
//! │   Catalog    │──────────▶│ Pinout tree  │◀─────────│   Source     │
//! │ (curated)    │           │ index.json   │          │ embedded/dir │
//! └──────────────┘           │ soc/ boards/ │          │ /http        │
//!                            └──────────────┘          └──────┬───────┘
//!                                                             │
//!                                                             ▼
//!                                                     ┌──────────────┐
//!                                                     │   Resolver   │
//!                                                     │ (cached)     │
//!                                                     └──────────────┘
//! ```
//!
//! The resolver falls back through exact board id, alias, board-to-SoC
//! alias, silicon variant, silicon platform, and finally an `unknown`
//! placeholder. A source that cannot serve a file never fails a lookup; it
//! only moves resolution to the next step.

pub mod catalog;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod tree;

pub use catalog::Catalog;
pub use resolver::{BoardQuery, PinoutResolver, ResolutionStep, ResolvedLayout};
pub use schema::*;
pub use source::{
    DirectorySource, EmbeddedSource, HttpSource, PinoutSource, PinoutSourceConfig,
};
pub use tree::{render_tree, verify_tree, write_tree, RenderedTree, VerifyError};

use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming a pinout tree directory.
pub const PINOUTS_DIR_ENV: &str = "PINGUARD_PINOUTS";
/// Environment variable naming a base URL that serves a pinout tree.
pub const PINOUTS_URL_ENV: &str = "PINGUARD_PINOUTS_URL";

#[derive(Debug, Error)]
pub enum PinoutError {
    #[error("Pinout file not found: {0}")]
    NotFound(String),

    #[error("Refusing path outside the pinout root: {0}")]
    InvalidPath(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid JSON in {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

/// Find an on-disk pinout tree (a directory holding `index.json`).
///
/// Looks next to the executable, then in the current directory, then in the
/// user's data directory.
pub fn locate_pinouts_directory() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            candidates.push(parent.join("pinouts"));
            // Installed layout: bin/pinguard -> share/pinguard/pinouts
            if let Some(prefix) = parent.parent() {
                candidates.push(prefix.join("share").join("pinguard").join("pinouts"));
            }
        }
    }

    candidates.push(PathBuf::from("pinouts"));

    if let Some(dir) = user_pinouts_directory() {
        candidates.push(dir);
    }

    candidates
        .into_iter()
        .find(|dir| dir.join(tree::INDEX_FILE).is_file())
}

fn user_pinouts_directory() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join("Library/Application Support/pinguard/pinouts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(app_data) = std::env::var_os("APPDATA") {
            return Some(PathBuf::from(app_data).join("pinguard/pinouts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(data) = std::env::var_os("XDG_DATA_HOME") {
            return Some(PathBuf::from(data).join("pinguard/pinouts"));
        }
        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".local/share/pinguard/pinouts"));
        }
    }

    None
}

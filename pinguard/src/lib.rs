//! PinGuard - GPIO pin usage extraction and conflict checking for ESPHome configs
//!
//! This library scans ESPHome YAML configs without a YAML parser, recovers
//! the board identity and every GPIO the config uses, and checks those pins
//! against a knowledge base of board layouts and pin hazards (strapping
//! pins, flash/PSRAM pins, input-only pins, pins not broken out).
//!
//! # Quick Start
//!
//! ```no_run
//! use pinguard::{CheckOptions, PinGuardCore};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), pinguard::PinGuardError> {
//! let result = PinGuardCore::check_file(Path::new("kitchen.yaml"), CheckOptions::default()).await?;
//!
//! for finding in &result.findings {
//!     println!("{}: {}", finding.severity, finding.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Parsing alone is synchronous and never fails:
//!
//! ```
//! let parsed = pinguard::parse_config("esphome:\n  name: x\nesp32:\n  board: esp32dev\n");
//! assert!(parsed.ok);
//! assert_eq!(parsed.board.as_deref(), Some("esp32dev"));
//! ```
//!
//! # Features
//!
//! - **Tolerant scanner**: substitutions, inline and nested pin forms, `P1.11` bank notation
//! - **Knowledge base**: built-in catalog, on-disk tree, or HTTP-hosted tree
//! - **Deterministic tree build**: hashed manifest for drift checks
//! - **Editor session**: debounced per-document analysis

pub mod checker;
pub mod core;
pub mod parser;
pub mod pinouts;
pub mod report;
pub mod session;

// Re-export main types
pub use crate::core::{
    discover_config_files, CheckOptions, PinGuardCore, PinGuardError,
};
pub use checker::{PinAssessment, PinChecker, PinIssue};
pub use parser::{parse_config, ParsedConfig, PinUsage, UnresolvedPinRef};
pub use pinouts::{
    BoardDefinition, Catalog, PinoutError, PinoutResolver, PinoutSourceConfig, Severity,
};
pub use report::{CheckResult, CheckStats, Finding};
pub use session::{Analysis, DocumentId, Session};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        parse_config, CheckOptions, CheckResult, Finding, ParsedConfig, PinGuardCore,
        PinGuardError, PinoutResolver, Severity,
    };
}

//! ESPHome config scanning.
//!
//! The scanner is line-oriented and deliberately tolerant: it never fails,
//! it only reports what it could recognize. Input is the document text, not
//! a YAML tree, so anchors, `!include`, and `packages:` are not followed.

pub mod board;
pub mod config;
pub mod lines;
pub mod pins;
pub mod schema;
pub mod substitutions;
pub mod value;

pub use board::{extract_board_identity, BoardIdentity, SILICON_BLOCKS};
pub use config::{looks_like_config, parse_config, DIALECT_MARKERS, NOT_A_CONFIG_REASON};
pub use pins::{is_pin_key, scan_pin_usages, PinScan, NESTED_PIN_MISSING};
pub use schema::{ItemContext, ParsedConfig, PinUsage, UnresolvedPinRef};
pub use substitutions::{extract_substitutions, SUBSTITUTIONS_BLOCK};
pub use value::{expand_templates, resolve_pin_value, PinResolution, Substitutions};

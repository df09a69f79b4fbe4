//! Curated board catalog.
//!
//! The catalog is the hand-maintained input of the pinout tree. It is read
//! from JSON files compiled into the binary, or from a directory with the
//! same layout:
//!
//! ```text
//! soc/<id>.json              soc-grid definitions
//! boards/<id>.json           header-board / svg-board definitions (pins by target)
//! board-soc-aliases.json     board id -> { soc, displayName, pinIssues? }
//! aliases.json               extra alternate spellings
//! ```
//!
//! Board pins are written as `{label, target}`; the GPIO number and pin type
//! are derived from the target when the catalog is loaded.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::pinouts::schema::*;
use crate::pinouts::PinoutError;

const EMBEDDED_SOCS: &[(&str, &str)] = &[
    ("soc/esp32.json", include_str!("../../catalog/soc/esp32.json")),
    ("soc/esp32c3.json", include_str!("../../catalog/soc/esp32c3.json")),
    ("soc/esp32c6.json", include_str!("../../catalog/soc/esp32c6.json")),
    ("soc/esp32s2.json", include_str!("../../catalog/soc/esp32s2.json")),
    ("soc/esp32s3.json", include_str!("../../catalog/soc/esp32s3.json")),
    ("soc/esp8266.json", include_str!("../../catalog/soc/esp8266.json")),
    ("soc/nrf52840.json", include_str!("../../catalog/soc/nrf52840.json")),
    ("soc/rp2040.json", include_str!("../../catalog/soc/rp2040.json")),
];

const EMBEDDED_BOARDS: &[(&str, &str)] = &[
    (
        "boards/esp32doit-devkit-v1.json",
        include_str!("../../catalog/boards/esp32doit-devkit-v1.json"),
    ),
    (
        "boards/seeed_xiao_esp32c3.json",
        include_str!("../../catalog/boards/seeed_xiao_esp32c3.json"),
    ),
];

const EMBEDDED_BOARD_SOC_ALIASES: &str = include_str!("../../catalog/board-soc-aliases.json");
const EMBEDDED_ALIASES: &str = include_str!("../../catalog/aliases.json");

const BOARD_SOC_ALIASES_FILE: &str = "board-soc-aliases.json";
const ALIASES_FILE: &str = "aliases.json";

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum CuratedBoard {
    HeaderBoard(CuratedHeaderBoard),
    SvgBoard(CuratedSvgBoard),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CuratedHeaderBoard {
    display_name: String,
    soc_ref: Option<String>,
    headers: Vec<CuratedHeader>,
    #[serde(default)]
    pin_issues: Vec<PinRule>,
}

#[derive(Debug, Deserialize)]
struct CuratedHeader {
    name: String,
    side: HeaderSide,
    pins: Vec<CuratedPin>,
}

#[derive(Debug, Deserialize)]
struct CuratedPin {
    label: String,
    target: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CuratedSvgBoard {
    display_name: String,
    soc_ref: Option<String>,
    svg_path: String,
    size_mm: SizeMm,
    pins: Vec<CuratedSvgPin>,
    #[serde(default)]
    pin_issues: Vec<PinRule>,
}

#[derive(Debug, Deserialize)]
struct CuratedSvgPin {
    label: String,
    x: f64,
    y: f64,
    target: String,
}

/// Loaded, cross-checked catalog. Board definitions already carry their
/// SoC family rules followed by their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub socs: BTreeMap<String, SocGrid>,
    pub boards: BTreeMap<String, BoardDefinition>,
    pub board_soc_aliases: BTreeMap<String, BoardSocAlias>,
    pub aliases: BTreeMap<String, String>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, PinoutError> {
        let socs = EMBEDDED_SOCS
            .iter()
            .map(|(path, text)| (stem(path), *path, *text))
            .collect::<Vec<_>>();
        let boards = EMBEDDED_BOARDS
            .iter()
            .map(|(path, text)| (stem(path), *path, *text))
            .collect::<Vec<_>>();

        let board_soc_aliases = decode(BOARD_SOC_ALIASES_FILE, EMBEDDED_BOARD_SOC_ALIASES)?;
        let extra_aliases = decode(ALIASES_FILE, EMBEDDED_ALIASES)?;

        Self::assemble(
            socs.iter().map(|(id, p, t)| (id.as_str(), *p, *t)),
            boards.iter().map(|(id, p, t)| (id.as_str(), *p, *t)),
            board_soc_aliases,
            extra_aliases,
        )
    }

    /// Load a catalog laid out on disk like the embedded one.
    pub fn from_directory(dir: &Path) -> Result<Self, PinoutError> {
        let socs = read_json_dir(&dir.join("soc"))?;
        let boards = read_json_dir(&dir.join("boards"))?;

        let board_soc_aliases = match read_optional(&dir.join(BOARD_SOC_ALIASES_FILE))? {
            Some(text) => decode(BOARD_SOC_ALIASES_FILE, &text)?,
            None => BTreeMap::new(),
        };
        let extra_aliases = match read_optional(&dir.join(ALIASES_FILE))? {
            Some(text) => decode(ALIASES_FILE, &text)?,
            None => BTreeMap::new(),
        };

        tracing::info!(
            socs = socs.len(),
            boards = boards.len(),
            "loaded catalog from {}",
            dir.display()
        );

        Self::assemble(
            socs.iter().map(|(id, p, t)| (id.as_str(), p.as_str(), t.as_str())),
            boards.iter().map(|(id, p, t)| (id.as_str(), p.as_str(), t.as_str())),
            board_soc_aliases,
            extra_aliases,
        )
    }

    fn assemble<'a>(
        soc_files: impl Iterator<Item = (&'a str, &'a str, &'a str)>,
        board_files: impl Iterator<Item = (&'a str, &'a str, &'a str)>,
        board_soc_aliases: BTreeMap<String, BoardSocAlias>,
        extra_aliases: BTreeMap<String, String>,
    ) -> Result<Self, PinoutError> {
        let mut socs = BTreeMap::new();
        for (id, path, text) in soc_files {
            let mut grid: SocGrid = match decode::<BoardDefinition>(path, text)? {
                BoardDefinition::SocGrid(grid) => grid,
                other => {
                    return Err(PinoutError::Catalog(format!(
                        "{} must be a soc-grid, found {}",
                        path,
                        other.kind()
                    )))
                }
            };
            grid.id = Some(id.to_string());
            socs.insert(id.to_string(), grid);
        }

        let mut boards = BTreeMap::new();
        for (id, path, text) in board_files {
            let curated: CuratedBoard = decode(path, text)?;
            let board = normalize_board(id, curated, &socs)?;
            boards.insert(id.to_string(), board);
        }

        for (board, alias) in &board_soc_aliases {
            if !socs.contains_key(&alias.soc) {
                return Err(PinoutError::Catalog(format!(
                    "board-soc alias {} points at unknown soc {}",
                    board, alias.soc
                )));
            }
        }

        let canonical = boards.keys().chain(board_soc_aliases.keys()).map(String::as_str);
        let mut aliases = build_aliases(canonical);
        aliases.extend(extra_aliases);
        aliases.retain(|alt, target| {
            alt.as_str() != target.as_str()
                && !boards.contains_key(alt)
                && !board_soc_aliases.contains_key(alt)
        });

        for (alt, target) in &aliases {
            if !boards.contains_key(target) && !board_soc_aliases.contains_key(target) {
                return Err(PinoutError::Catalog(format!(
                    "alias {} points at unknown board {}",
                    alt, target
                )));
            }
        }

        Ok(Self {
            socs,
            boards,
            board_soc_aliases,
            aliases,
        })
    }

    pub fn index(&self) -> PinoutIndex {
        PinoutIndex {
            schema_version: INDEX_SCHEMA_VERSION,
            boards: self
                .boards
                .keys()
                .map(|id| (id.clone(), board_path(id)))
                .collect(),
            soc: self.socs.keys().map(|id| (id.clone(), soc_path(id))).collect(),
            aliases: self.aliases.clone(),
            board_soc_aliases: self.board_soc_aliases.clone(),
        }
    }
}

pub fn board_path(id: &str) -> String {
    format!("boards/{}.json", id)
}

pub fn soc_path(id: &str) -> String {
    format!("soc/{}.json", id)
}

fn stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, text: &str) -> Result<T, PinoutError> {
    serde_json::from_str(text).map_err(|source| PinoutError::Decode {
        path: path.to_string(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, PinoutError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PinoutError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// `(id, display path, text)` for every `*.json` in `dir`, sorted by id.
fn read_json_dir(dir: &Path) -> Result<Vec<(String, String, String)>, PinoutError> {
    let io_err = |source| PinoutError::Io {
        path: dir.display().to_string(),
        source,
    };

    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        let text = std::fs::read_to_string(&path).map_err(|source| PinoutError::Io {
            path: path.display().to_string(),
            source,
        })?;
        files.push((id, path.display().to_string(), text));
    }
    files.sort();
    Ok(files)
}

fn family_rules(soc_ref: Option<&str>, socs: &BTreeMap<String, SocGrid>) -> Vec<PinRule> {
    soc_ref
        .and_then(|soc| socs.get(soc))
        .map(|grid| grid.pin_issues.clone())
        .unwrap_or_default()
}

fn normalize_board(
    id: &str,
    curated: CuratedBoard,
    socs: &BTreeMap<String, SocGrid>,
) -> Result<BoardDefinition, PinoutError> {
    let board = match curated {
        CuratedBoard::HeaderBoard(b) => {
            let mut pin_issues = family_rules(b.soc_ref.as_deref(), socs);
            pin_issues.extend(b.pin_issues);
            let headers = b
                .headers
                .into_iter()
                .map(|h| Header {
                    name: h.name,
                    side: h.side,
                    pins: h
                        .pins
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| {
                            let gpio = parse_gpio_token(&p.target);
                            HeaderPin {
                                pin_type: classify_pin_type(&p.label, &p.target, gpio),
                                label: p.label,
                                gpio,
                                header_no: i as u32 + 1,
                            }
                        })
                        .collect(),
                })
                .collect();
            BoardDefinition::HeaderBoard(HeaderBoard {
                id: Some(id.to_string()),
                display_name: b.display_name,
                soc_ref: b.soc_ref,
                headers,
                pin_issues,
            })
        }
        CuratedBoard::SvgBoard(b) => {
            let mut pin_issues = family_rules(b.soc_ref.as_deref(), socs);
            pin_issues.extend(b.pin_issues);
            let pins = b
                .pins
                .into_iter()
                .map(|p| {
                    let gpio = parse_gpio_token(&p.target);
                    SvgPin {
                        pin_type: classify_pin_type(&p.label, &p.target, gpio),
                        label: p.label,
                        x: p.x,
                        y: p.y,
                        target_raw: p.target,
                        gpio,
                    }
                })
                .collect();
            BoardDefinition::SvgBoard(SvgBoard {
                id: Some(id.to_string()),
                display_name: b.display_name,
                soc_ref: b.soc_ref,
                svg_path: b.svg_path,
                size_mm: b.size_mm,
                pins,
                pin_issues,
            })
        }
    };

    if let Some(soc) = soc_ref(&board) {
        if !socs.contains_key(soc) {
            tracing::warn!("board {} references unknown soc {}", id, soc);
        }
    }
    Ok(board)
}

fn soc_ref(board: &BoardDefinition) -> Option<&str> {
    match board {
        BoardDefinition::HeaderBoard(b) => b.soc_ref.as_deref(),
        BoardDefinition::SvgBoard(b) => b.soc_ref.as_deref(),
        BoardDefinition::SocGrid(b) => b.soc_ref.as_deref(),
        BoardDefinition::Unknown(_) => None,
    }
}

fn gpio_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:GPIO\s*)?(\d+)$").expect("valid regex"))
}

fn bank_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^P([01])\.(\d+)$").expect("valid regex"))
}

/// GPIO number of a board pin target: `GPIO5`, `5`, or `P1.02`.
pub fn parse_gpio_token(token: &str) -> Option<u32> {
    let raw = token.trim();
    if let Some(caps) = gpio_token_re().captures(raw) {
        return caps[1].parse().ok();
    }
    let caps = bank_token_re().captures(raw)?;
    let bank: u32 = caps[1].parse().ok()?;
    let pin: u32 = caps[2].parse().ok()?;
    (bank * 32).checked_add(pin)
}

pub fn classify_pin_type(label: &str, target: &str, gpio: Option<u32>) -> PinType {
    let target = target.trim().to_uppercase();
    let label = label.to_uppercase();

    if target == "GND" || label == "GND" || label.starts_with("GND.") {
        return PinType::Ground;
    }
    if target.starts_with("POWER(")
        || ["3V", "5V", "VBUS"].iter().any(|p| label.starts_with(p))
        || label.contains("VCC")
    {
        return PinType::Power;
    }
    if matches!(target.as_str(), "CHIP_PU" | "EN" | "RST" | "RUN") || label.contains("RST") {
        return PinType::Reset;
    }
    if gpio.is_some() {
        PinType::Gpio
    } else {
        PinType::Other
    }
}

/// Lowercase, underscore and dash spellings of every canonical id.
pub fn build_aliases<'a>(board_ids: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for id in board_ids {
        for alt in [id.to_lowercase(), id.replace('-', "_"), id.replace('_', "-")] {
            if alt != id {
                aliases.insert(alt, id.to_string());
            }
        }
    }
    aliases
}

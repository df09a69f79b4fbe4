//! Board identity to layout resolution.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::parser::ParsedConfig;
use crate::pinouts::schema::{BoardDefinition, BoardSocAlias, PinoutIndex};
use crate::pinouts::source::PinoutSource;
use crate::pinouts::tree::INDEX_FILE;
use crate::pinouts::PinoutError;

/// What a config says about its hardware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardQuery {
    pub board: Option<String>,
    pub variant: Option<String>,
    pub platform: Option<String>,
}

impl BoardQuery {
    pub fn from_config(config: &ParsedConfig) -> Self {
        Self {
            board: config.board.clone(),
            variant: config.variant.clone(),
            platform: config.platform.clone(),
        }
    }

    pub fn board(board: impl Into<String>) -> Self {
        Self {
            board: Some(board.into()),
            ..Self::default()
        }
    }
}

/// Which step of the fallback chain produced the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStep {
    Exact,
    Alias,
    BoardSocAlias,
    Variant,
    Platform,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ResolvedLayout {
    pub definition: Arc<BoardDefinition>,
    pub step: ResolutionStep,
}

/// `ESP32-S3` and `esp32_s3` both become `esp32s3`.
pub fn normalize_soc_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

type DefinitionCell = Arc<OnceCell<Arc<BoardDefinition>>>;

/// Cached view of one pinout source.
///
/// The index and every definition are fetched at most once on success.
/// Concurrent lookups of the same path wait on a single fetch; a failed
/// fetch is not remembered, so the next lookup tries again.
pub struct PinoutResolver {
    source: Arc<dyn PinoutSource>,
    index: OnceCell<Arc<PinoutIndex>>,
    definitions: Mutex<HashMap<String, DefinitionCell>>,
}

impl PinoutResolver {
    pub fn new(source: Arc<dyn PinoutSource>) -> Self {
        Self {
            source,
            index: OnceCell::new(),
            definitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn PinoutSource> {
        &self.source
    }

    pub async fn index(&self) -> Result<Arc<PinoutIndex>, PinoutError> {
        self.index
            .get_or_try_init(|| async {
                let text = self.source.fetch_text(INDEX_FILE).await?;
                let index: PinoutIndex =
                    serde_json::from_str(&text).map_err(|source| PinoutError::Decode {
                        path: INDEX_FILE.to_string(),
                        source,
                    })?;
                tracing::info!(
                    boards = index.boards.len(),
                    socs = index.soc.len(),
                    aliases = index.aliases.len(),
                    "loaded pinout index from {}",
                    self.source.describe()
                );
                Ok::<_, PinoutError>(Arc::new(index))
            })
            .await
            .cloned()
    }

    fn cell_for(&self, rel_path: &str) -> DefinitionCell {
        let mut cells = match self.definitions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cells
            .entry(rel_path.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    pub async fn definition(&self, rel_path: &str) -> Result<Arc<BoardDefinition>, PinoutError> {
        let cell = self.cell_for(rel_path);
        cell.get_or_try_init(|| async {
            let text = self.source.fetch_text(rel_path).await?;
            let def: BoardDefinition =
                serde_json::from_str(&text).map_err(|source| PinoutError::Decode {
                    path: rel_path.to_string(),
                    source,
                })?;
            tracing::debug!("loaded {} ({})", rel_path, def.kind());
            Ok::<_, PinoutError>(Arc::new(def))
        })
        .await
        .cloned()
    }

    async fn try_definition(&self, rel_path: Option<&String>) -> Option<Arc<BoardDefinition>> {
        let rel_path = rel_path?;
        match self.definition(rel_path).await {
            Ok(def) => Some(def),
            Err(e) => {
                tracing::warn!("failed to load pinout {}: {}", rel_path, e);
                None
            }
        }
    }

    /// Walk the fallback chain. Never fails; the last step is a placeholder.
    pub async fn resolve(&self, query: &BoardQuery) -> ResolvedLayout {
        let board = query.board.as_deref().filter(|b| !b.is_empty());

        let index = match self.index().await {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!("pinout index unavailable: {}", e);
                None
            }
        };

        if let Some(index) = index.as_deref() {
            if let Some(layout) = self.resolve_in(index, board, query).await {
                return layout;
            }
        }

        tracing::debug!(board = ?board, "no layout found");
        ResolvedLayout {
            definition: Arc::new(BoardDefinition::unknown(board)),
            step: ResolutionStep::Unknown,
        }
    }

    async fn resolve_in(
        &self,
        index: &PinoutIndex,
        board: Option<&str>,
        query: &BoardQuery,
    ) -> Option<ResolvedLayout> {
        let found = |definition, step| {
            tracing::debug!(board = ?board, ?step, "resolved layout");
            Some(ResolvedLayout { definition, step })
        };

        let mut canonical = board;
        if let Some(board) = board {
            if let Some(def) = self.try_definition(index.boards.get(board)).await {
                return found(def, ResolutionStep::Exact);
            }

            if let Some(target) = index.aliases.get(board) {
                canonical = Some(target.as_str());
                if let Some(def) = self.try_definition(index.boards.get(target)).await {
                    return found(def, ResolutionStep::Alias);
                }
            }
        }

        if let Some(canonical) = canonical {
            if let Some(alias) = index.board_soc_aliases.get(canonical) {
                if let Some(soc) = self.try_definition(index.soc.get(&alias.soc)).await {
                    let def = apply_soc_alias(&soc, canonical, alias);
                    return found(Arc::new(def), ResolutionStep::BoardSocAlias);
                }
            }
        }

        if let Some(variant) = query.variant.as_deref() {
            let key = normalize_soc_key(variant);
            if let Some(def) = self.try_definition(index.soc.get(&key)).await {
                return found(def, ResolutionStep::Variant);
            }
        }

        if let Some(platform) = query.platform.as_deref() {
            let key = normalize_soc_key(platform);
            if let Some(def) = self.try_definition(index.soc.get(&key)).await {
                return found(def, ResolutionStep::Platform);
            }
        }

        None
    }
}

/// SoC grid presented under the board's id and name, with the board's own
/// rules appended after the family rules.
fn apply_soc_alias(soc: &BoardDefinition, board: &str, alias: &BoardSocAlias) -> BoardDefinition {
    match soc {
        BoardDefinition::SocGrid(grid) => {
            let mut grid = grid.clone();
            grid.variant = grid.variant.or_else(|| Some(alias.soc.clone()));
            grid.id = Some(board.to_string());
            if !alias.display_name.is_empty() {
                grid.display_name = alias.display_name.clone();
            }
            grid.pin_issues.extend(alias.pin_issues.iter().cloned());
            BoardDefinition::SocGrid(grid)
        }
        other => {
            tracing::warn!(
                "board-soc alias {} points at a {} definition",
                board,
                other.kind()
            );
            other.clone()
        }
    }
}

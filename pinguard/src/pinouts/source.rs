//! Where pinout tree files come from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::pinouts::catalog::Catalog;
use crate::pinouts::tree::{render_tree, RenderedTree};
use crate::pinouts::{locate_pinouts_directory, PinoutError};

/// Serves files of a pinout tree by path relative to the tree root.
#[async_trait]
pub trait PinoutSource: Send + Sync {
    /// Short human-readable description, e.g. `directory ./pinouts`.
    fn describe(&self) -> String;

    async fn fetch_text(&self, rel_path: &str) -> Result<String, PinoutError>;
}

/// A rendered tree held in memory. The default source is the built-in
/// catalog rendered at startup.
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    files: BTreeMap<String, String>,
}

impl EmbeddedSource {
    pub fn builtin() -> Result<Self, PinoutError> {
        let catalog = Catalog::builtin()?;
        Ok(Self::from_tree(render_tree(&catalog, DateTime::<Utc>::default())?))
    }

    pub fn from_tree(tree: RenderedTree) -> Self {
        Self { files: tree.files }
    }

    /// Arbitrary in-memory files, mainly for tests.
    pub fn from_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl PinoutSource for EmbeddedSource {
    fn describe(&self) -> String {
        "built-in catalog".to_string()
    }

    async fn fetch_text(&self, rel_path: &str) -> Result<String, PinoutError> {
        self.files
            .get(rel_path)
            .cloned()
            .ok_or_else(|| PinoutError::NotFound(rel_path.to_string()))
    }
}

/// A pinout tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `rel_path` onto the root, rejecting anything that could escape it.
    fn resolve(&self, rel_path: &str) -> Result<PathBuf, PinoutError> {
        let rel = Path::new(rel_path);
        let safe = !rel_path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(PinoutError::InvalidPath(rel_path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl PinoutSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn fetch_text(&self, rel_path: &str) -> Result<String, PinoutError> {
        let path = self.resolve(rel_path)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PinoutError::NotFound(rel_path.to_string()))
            }
            Err(source) => Err(PinoutError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// A pinout tree served over HTTP(S) under a base URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn url_for(&self, rel_path: &str) -> String {
        format!("{}/{}", self.base_url, rel_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PinoutSource for HttpSource {
    fn describe(&self) -> String {
        format!("url {}", self.base_url)
    }

    async fn fetch_text(&self, rel_path: &str) -> Result<String, PinoutError> {
        if rel_path.split('/').any(|part| part == "..") {
            return Err(PinoutError::InvalidPath(rel_path.to_string()));
        }

        let url = self.url_for(rel_path);
        tracing::debug!("fetching {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PinoutError::NotFound(rel_path.to_string()));
        }
        if !status.is_success() {
            return Err(PinoutError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Which source to build, as chosen by flags or environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PinoutSourceConfig {
    /// Use an on-disk tree if one can be found, else the built-in catalog.
    #[default]
    Auto,
    Embedded,
    Directory(PathBuf),
    Url(String),
}

impl PinoutSourceConfig {
    /// A URL beats a directory; neither means [`PinoutSourceConfig::Auto`].
    pub fn from_options(dir: Option<PathBuf>, url: Option<String>) -> Self {
        match (url, dir) {
            (Some(url), _) if !url.trim().is_empty() => PinoutSourceConfig::Url(url),
            (_, Some(dir)) => PinoutSourceConfig::Directory(dir),
            _ => PinoutSourceConfig::Auto,
        }
    }

    pub fn build(&self) -> Result<Arc<dyn PinoutSource>, PinoutError> {
        let source: Arc<dyn PinoutSource> = match self {
            PinoutSourceConfig::Auto => match locate_pinouts_directory() {
                Some(dir) => Arc::new(DirectorySource::new(dir)),
                None => Arc::new(EmbeddedSource::builtin()?),
            },
            PinoutSourceConfig::Embedded => Arc::new(EmbeddedSource::builtin()?),
            PinoutSourceConfig::Directory(dir) => Arc::new(DirectorySource::new(dir.clone())),
            PinoutSourceConfig::Url(url) => Arc::new(HttpSource::new(url.clone())),
        };
        tracing::info!("using pinouts from {}", source.describe());
        Ok(source)
    }
}

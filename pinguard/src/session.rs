//! Editor session: debounced, cancellable per-document analysis.
//!
//! Each open document has at most one pending analysis. Scheduling a new
//! one aborts the previous task, so a burst of edits produces a single
//! result once the document has been quiet for the debounce interval.
//! Results are published on a broadcast channel.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::PinGuardCore;
use crate::pinouts::PinoutResolver;
use crate::report::CheckResult;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

const EVENT_CAPACITY: usize = 64;

/// Opaque document key, usually a path or editor URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&Path> for DocumentId {
    fn from(path: &Path) -> Self {
        Self::new(path.display().to_string())
    }
}

/// One finished analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub document: DocumentId,
    /// Monotonic across the session; later analyses have larger revisions.
    pub revision: u64,
    pub result: Arc<CheckResult>,
}

pub struct Session {
    resolver: Arc<PinoutResolver>,
    debounce: Duration,
    pending: Mutex<HashMap<DocumentId, JoinHandle<()>>>,
    events: broadcast::Sender<Analysis>,
    revision: Arc<AtomicU64>,
}

impl Session {
    pub fn new(resolver: Arc<PinoutResolver>) -> Self {
        Self::with_debounce(resolver, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(resolver: Arc<PinoutResolver>, debounce: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            resolver,
            debounce,
            pending: Mutex::new(HashMap::new()),
            events,
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn resolver(&self) -> &Arc<PinoutResolver> {
        &self.resolver
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Analysis> {
        self.events.subscribe()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<DocumentId, JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Analyze `text` after the debounce interval, replacing any pending
    /// analysis of the same document. Must be called inside a tokio runtime.
    pub fn schedule(&self, document: DocumentId, text: String) {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let revision = self.revision.clone();
        let delay = self.debounce;
        let doc = document.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let analysis = run(&resolver, &revision, doc, &text).await;
            // No subscribers is fine.
            let _ = events.send(analysis);
        });

        if let Some(previous) = self.pending().insert(document, handle) {
            previous.abort();
        }
    }

    /// Analyze immediately, dropping any pending analysis of the document.
    pub async fn analyze_now(&self, document: DocumentId, text: &str) -> Analysis {
        self.cancel(&document);
        let analysis = run(&self.resolver, &self.revision, document, text).await;
        let _ = self.events.send(analysis.clone());
        analysis
    }

    /// Abort the pending analysis of `document`. Returns `true` if one was
    /// still waiting or running.
    pub fn cancel(&self, document: &DocumentId) -> bool {
        match self.pending().remove(document) {
            Some(handle) => {
                let active = !handle.is_finished();
                handle.abort();
                active
            }
            None => false,
        }
    }

    /// Documents with an analysis still waiting or running.
    pub fn pending_count(&self) -> usize {
        self.pending().values().filter(|h| !h.is_finished()).count()
    }

    pub fn close(&self, document: &DocumentId) {
        self.cancel(document);
    }
}

async fn run(
    resolver: &PinoutResolver,
    revision: &AtomicU64,
    document: DocumentId,
    text: &str,
) -> Analysis {
    let revision = revision.fetch_add(1, Ordering::SeqCst) + 1;
    let result = PinGuardCore::check_text(text, document.as_str(), resolver).await;
    tracing::debug!(document = %document, revision, "analysis finished");
    Analysis {
        document,
        revision,
        result: Arc::new(result),
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, handle) in self.pending().drain() {
            handle.abort();
        }
    }
}

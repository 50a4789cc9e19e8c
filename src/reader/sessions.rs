//! Reader session registry
//!
//! Owns every live session and drives the lifecycle the routes expose:
//! open (async document load), navigation, debounced viewport updates,
//! frame access, and delayed close. The registry holds the document cache
//! so sessions render through the shared raster LRU.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;
use uuid::Uuid;

use crate::document::{DocumentCache, DocumentError};
use crate::shelf::Book;

use super::session::{
    resolve_nav, trigger_render, NavTarget, PageFrame, ReaderSession, SessionRef, SessionState,
};
use super::viewport::ContainerSize;

/// Resize reports within this window collapse into one re-render.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);
/// Delay between a close request and the session actually going away.
pub const CLOSE_FADE_DELAY: Duration = Duration::from_millis(300);

/// Snapshot of a session for status responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: String,
    pub book_id: String,
    pub state: SessionState,
    pub page: usize,
    pub total_pages: usize,
}

/// Thread-safe registry of reader sessions.
#[derive(Clone)]
pub struct ReaderSessions {
    cache: DocumentCache,
    sessions: Arc<RwLock<HashMap<String, SessionRef>>>,
}

impl ReaderSessions {
    pub fn new(cache: DocumentCache) -> Self {
        Self {
            cache,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn document_cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Open a session for a book and start loading its document.
    ///
    /// The returned session starts in `Loading`; a load failure moves it to
    /// `Failed` (logged, no retry).
    pub async fn open(&self, book: &Book) -> String {
        let id = Uuid::new_v4().to_string();
        let session: SessionRef = Arc::new(Mutex::new(ReaderSession::new(
            id.clone(),
            book.id.clone(),
        )));

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), session.clone());
        }

        tokio::spawn(load_document(session, self.cache.clone(), book.clone()));
        id
    }

    pub async fn get(&self, id: &str) -> Option<SessionRef> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Status snapshot, or None for an unknown session.
    pub async fn status(&self, id: &str) -> Option<SessionStatus> {
        let session = self.get(id).await?;
        let s = session.lock().await;
        Some(SessionStatus {
            id: s.id().to_string(),
            book_id: s.book_id().to_string(),
            state: s.state(),
            page: s.page(),
            total_pages: s.total_pages(),
        })
    }

    /// Navigate within `[1, totalPages]`; out-of-range requests are
    /// silently ignored. Returns the page after the request, or None for an
    /// unknown session.
    pub async fn navigate(&self, id: &str, target: NavTarget) -> Option<usize> {
        let session = self.get(id).await?;

        let changed = {
            let mut s = session.lock().await;
            match resolve_nav(s.page, s.total_pages, target) {
                Some(page) if s.doc.is_some() && s.state != SessionState::Closing => {
                    s.page = page;
                    true
                }
                _ => false,
            }
        };

        if changed {
            trigger_render(session.clone(), self.cache.clone()).await;
        }

        let page = session.lock().await.page;
        Some(page)
    }

    /// Record the client's container and schedule a re-render.
    ///
    /// The first report renders immediately; later reports are debounced by
    /// [`RESIZE_DEBOUNCE`], and a newer report resets the window.
    pub async fn set_viewport(&self, id: &str, container: ContainerSize) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };

        let render_now = {
            let mut s = session.lock().await;
            if s.state == SessionState::Closing {
                return true;
            }

            let first_report = s.container.is_none();
            s.container = Some(container);

            if let Some(task) = s.debounce_task.take() {
                task.abort();
            }

            if !first_report {
                let debounced = session.clone();
                let cache = self.cache.clone();
                s.debounce_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(RESIZE_DEBOUNCE).await;
                    trigger_render(debounced, cache).await;
                }));
            }
            first_report
        };

        if render_now {
            trigger_render(session, self.cache.clone()).await;
        }
        true
    }

    /// The latest frame. Outer None: unknown session; inner None: nothing
    /// rendered yet.
    pub async fn frame(&self, id: &str) -> Option<Option<PageFrame>> {
        let session = self.get(id).await?;
        let s = session.lock().await;
        Some(s.frame().cloned())
    }

    /// Begin closing a session: cancel its work, release its document, and
    /// remove it only after the fade-out delay elapses, never before.
    pub async fn close(&self, id: &str) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };

        {
            let mut s = session.lock().await;
            if s.state == SessionState::Closing {
                return true;
            }
            s.state = SessionState::Closing;
            s.abort_tasks();
            s.doc = None;
        }

        let sessions = self.sessions.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(CLOSE_FADE_DELAY).await;
            sessions.write().await.remove(&id);
        });
        true
    }

    /// Teardown: cancel and drop every session immediately.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (_, session) in sessions.drain() {
            let mut s = session.lock().await;
            s.state = SessionState::Closing;
            s.abort_tasks();
            s.doc = None;
        }
    }
}

/// Resolve the book's bytes and open its document.
async fn load_document(session: SessionRef, cache: DocumentCache, book: Book) {
    let result = match book.source.load().await {
        Ok(data) => cache.open(&book.id, data).await,
        Err(e) => Err(DocumentError::SourceError(e.to_string())),
    };

    let render_now = {
        let mut s = session.lock().await;
        if s.state == SessionState::Closing {
            return;
        }

        match result {
            Ok(doc) => {
                s.total_pages = doc.page_count();
                s.page = 1;
                s.doc = Some(doc);
                s.state = SessionState::Ready;
                // The client may have reported its container while the
                // document was still loading
                s.container.is_some()
            }
            Err(e) => {
                tracing::error!("Failed to load document for book '{}': {}", book.id, e);
                s.state = SessionState::Failed;
                false
            }
        }
    };

    if render_now {
        trigger_render(session, cache).await;
    }
}

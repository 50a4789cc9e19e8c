//! A single reader session
//!
//! Each open book gets one session tracking the current page, total page
//! count, the client's container, and the most recent rendered frame. A
//! session owns at most one in-flight render; starting a new render aborts
//! the previous task and awaits the abort before spawning the successor.
//! Every render carries a generation number, so a result that arrives after
//! it was superseded is dropped instead of applied: the displayed frame
//! always corresponds to the last requested page.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::document::{
    DocumentCache, DocumentHandle, ImageFormat, PageRenderRequest, RenderedPage,
};

use super::viewport::{ContainerSize, PageFit};

/// Encoding used for reader frames
pub(crate) const FRAME_FORMAT: ImageFormat = ImageFormat::Png;

/// Reader lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Document load in progress
    Loading,
    /// Document open, no render in flight
    Ready,
    /// A render is in flight
    Rendering,
    /// Document failed to load; no retry is attempted
    Failed,
    /// Close requested; the session survives only for the fade-out delay
    Closing,
}

/// The most recent rendered frame.
#[derive(Debug, Clone)]
pub struct PageFrame {
    /// Page this frame shows (1-indexed)
    pub page: usize,
    /// Encoded image bytes
    pub data: Vec<u8>,
    pub format: ImageFormat,
    /// Backing raster dimensions in physical pixels
    pub width: u32,
    pub height: u32,
    /// Displayed dimensions in CSS pixels
    pub css_width: f32,
    pub css_height: f32,
    pub fit_scale: f32,
}

/// Shared handle to a session.
pub type SessionRef = Arc<Mutex<ReaderSession>>;

/// Per-document reader state.
pub struct ReaderSession {
    pub(crate) id: String,
    pub(crate) book_id: String,
    pub(crate) state: SessionState,
    pub(crate) doc: Option<Arc<dyn DocumentHandle>>,
    pub(crate) page: usize,
    pub(crate) total_pages: usize,
    pub(crate) container: Option<ContainerSize>,
    pub(crate) frame: Option<PageFrame>,
    pub(crate) render_seq: u64,
    pub(crate) render_task: Option<JoinHandle<()>>,
    pub(crate) debounce_task: Option<JoinHandle<()>>,
}

impl ReaderSession {
    pub(crate) fn new(id: String, book_id: String) -> Self {
        Self {
            id,
            book_id,
            state: SessionState::Loading,
            doc: None,
            page: 1,
            total_pages: 0,
            container: None,
            frame: None,
            render_seq: 0,
            render_task: None,
            debounce_task: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn frame(&self) -> Option<&PageFrame> {
        self.frame.as_ref()
    }

    /// Abort in-flight work without waiting for acknowledgment.
    pub(crate) fn abort_tasks(&mut self) {
        if let Some(task) = self.render_task.take() {
            task.abort();
        }
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// A navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    /// Absolute page number (1-indexed)
    Page(usize),
    /// Relative offset from the current page
    Delta(i64),
}

/// Resolve a navigation request against the current position.
///
/// Returns the new page only when it is inside `[1, total]` and actually
/// different; anything else is a silent no-op.
pub fn resolve_nav(current: usize, total: usize, target: NavTarget) -> Option<usize> {
    let requested: i64 = match target {
        NavTarget::Page(page) => page as i64,
        NavTarget::Delta(delta) => current as i64 + delta,
    };

    if requested < 1 || requested > total as i64 {
        return None;
    }

    let requested = requested as usize;
    (requested != current).then_some(requested)
}

/// Cancel the in-flight render (awaiting the abort), then spawn a render of
/// the session's current page into its current container.
///
/// The session lock is held across the cancel-and-respawn so concurrent
/// triggers cannot leave two renders live.
pub(crate) async fn trigger_render(sess: SessionRef, cache: DocumentCache) {
    let mut s = sess.lock().await;

    if !matches!(s.state, SessionState::Ready | SessionState::Rendering) {
        return;
    }
    let Some(container) = s.container else {
        return;
    };
    let Some(doc) = s.doc.clone() else {
        return;
    };

    // Cancel the pending render before the new one begins and await the
    // acknowledgment; the join error from an aborted task is the ignored
    // cancellation error.
    if let Some(prev) = s.render_task.take() {
        prev.abort();
        let _ = prev.await;
    }

    s.render_seq += 1;
    s.state = SessionState::Rendering;
    let seq = s.render_seq;
    let page = s.page;
    let book_id = s.book_id.clone();

    s.render_task = Some(tokio::spawn(render_frame(
        sess.clone(),
        cache,
        doc,
        book_id,
        seq,
        page,
        container,
    )));
}

/// Render one frame and apply it if the session still wants it.
async fn render_frame(
    sess: SessionRef,
    cache: DocumentCache,
    doc: Arc<dyn DocumentHandle>,
    book_id: String,
    seq: u64,
    page: usize,
    container: ContainerSize,
) {
    let size_doc = doc.clone();
    let size = match tokio::task::spawn_blocking(move || size_doc.page_size(page)).await {
        Ok(Ok(size)) => size,
        Ok(Err(e)) => {
            tracing::error!("Failed to measure page {} of '{}': {}", page, book_id, e);
            finish_render(&sess, seq, None).await;
            return;
        }
        Err(e) => {
            tracing::error!("Page measurement task failed for '{}': {}", book_id, e);
            finish_render(&sess, seq, None).await;
            return;
        }
    };

    let fit = PageFit::compute(container, size);
    let request = PageRenderRequest::new(page, fit.render_scale, FRAME_FORMAT);

    let frame = match cache.render_page(&book_id, &request).await {
        Ok(rendered) => Some(build_frame(page, fit, rendered)),
        Err(e) => {
            // The previous frame remains displayed.
            tracing::error!("Failed to render page {} of '{}': {}", page, book_id, e);
            None
        }
    };

    finish_render(&sess, seq, frame).await;
}

fn build_frame(page: usize, fit: PageFit, rendered: RenderedPage) -> PageFrame {
    PageFrame {
        page,
        format: rendered.format,
        width: rendered.width,
        height: rendered.height,
        data: rendered.data,
        css_width: fit.css_width,
        css_height: fit.css_height,
        fit_scale: fit.fit_scale,
    }
}

async fn finish_render(sess: &SessionRef, seq: u64, frame: Option<PageFrame>) {
    let mut s = sess.lock().await;

    // A superseded or closed render's result is never applied.
    if s.render_seq != seq || s.state == SessionState::Closing {
        return;
    }

    if let Some(frame) = frame {
        s.frame = Some(frame);
    }
    s.state = SessionState::Ready;
    s.render_task = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_nav_bounds() {
        assert_eq!(resolve_nav(1, 10, NavTarget::Page(5)), Some(5));
        assert_eq!(resolve_nav(1, 10, NavTarget::Page(0)), None);
        assert_eq!(resolve_nav(1, 10, NavTarget::Page(11)), None);
        assert_eq!(resolve_nav(10, 10, NavTarget::Page(10)), None);
    }

    #[test]
    fn test_resolve_nav_delta() {
        assert_eq!(resolve_nav(5, 10, NavTarget::Delta(1)), Some(6));
        assert_eq!(resolve_nav(5, 10, NavTarget::Delta(-1)), Some(4));
        assert_eq!(resolve_nav(1, 10, NavTarget::Delta(-1)), None);
        assert_eq!(resolve_nav(10, 10, NavTarget::Delta(1)), None);
    }

    #[test]
    fn test_resolve_nav_empty_document() {
        assert_eq!(resolve_nav(1, 0, NavTarget::Page(1)), None);
        assert_eq!(resolve_nav(1, 0, NavTarget::Delta(0)), None);
    }

    #[test]
    fn test_session_starts_loading() {
        let session = ReaderSession::new("s1".to_string(), "b1".to_string());
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(session.page(), 1);
        assert_eq!(session.total_pages(), 0);
        assert!(session.frame().is_none());
    }
}

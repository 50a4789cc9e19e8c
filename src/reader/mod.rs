//! Paginated reader
//!
//! Per-client reader sessions over open documents: fit-to-container
//! viewport math, debounced resize handling, cancelable page renders, and
//! the delayed close that mirrors the client's fade-out.

pub mod session;
pub mod sessions;
pub mod viewport;

pub use session::{NavTarget, PageFrame, ReaderSession, SessionRef, SessionState};
pub use sessions::{ReaderSessions, SessionStatus, CLOSE_FADE_DELAY, RESIZE_DEBOUNCE};
pub use viewport::{ContainerSize, PageFit};

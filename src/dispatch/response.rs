use std::cell::{Cell, RefCell};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::warn;

/// Maximum inline response headers before heap allocation.
/// Most responses carry well under 16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the response hot path.
///
/// Header names use `Arc<str>` instead of `String` because names are often
/// repeated literals (`content-type`, `vary`, ...) and `Arc::clone()` is an
/// O(1) atomic increment; values are per-request data and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Staged response state for one request.
///
/// Handlers write status and headers into the handle and eventually call
/// [`finish`](Self::finish), the single designated close operation: it flips
/// the closed flag first and then stores the payload. Everything else only
/// ever reads the flag through [`is_closed`](Self::is_closed), which is what
/// makes "no work after close" enforceable across re-entrant dispatch.
#[derive(Debug)]
pub struct ResponseHandle {
    status: Cell<u16>,
    headers: RefCell<HeaderVec>,
    body: RefCell<Vec<u8>>,
    closed: Cell<bool>,
}

impl Default for ResponseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self {
            status: Cell::new(200),
            headers: RefCell::new(HeaderVec::new()),
            body: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        }
    }

    pub fn status(&self) -> u16 {
        self.status.get()
    }

    pub fn set_status(&self, status: u16) {
        self.status.set(status);
    }

    /// Add or replace a header (case-insensitive on the name).
    pub fn set_header(&self, name: &str, value: String) {
        let mut headers = self.headers.borrow_mut();
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        headers.push((Arc::from(name), value));
    }

    /// Get a staged header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .borrow()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Close the response with the given payload.
    ///
    /// The closed flag is set before the payload is stored, so any dispatch
    /// step observing the handle mid-close already sees it closed. Close is
    /// monotonic: a second call is ignored.
    pub fn finish(&self, body: Vec<u8>) {
        if self.closed.get() {
            warn!("finish called on an already closed response");
            return;
        }
        self.closed.set(true);
        *self.body.borrow_mut() = body;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Consume the handle into `(status, headers, body)` for the transport
    /// writer.
    pub fn into_parts(self) -> (u16, HeaderVec, Vec<u8>) {
        (
            self.status.get(),
            self.headers.into_inner(),
            self.body.into_inner(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_is_monotonic() {
        let handle = ResponseHandle::new();
        assert!(!handle.is_closed());
        handle.finish(b"first".to_vec());
        assert!(handle.is_closed());
        handle.finish(b"second".to_vec());
        let (_, _, body) = handle.into_parts();
        assert_eq!(body, b"first");
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let handle = ResponseHandle::new();
        handle.set_header("Content-Type", "text/plain".to_string());
        handle.set_header("content-type", "application/json".to_string());
        assert_eq!(
            handle.header("CONTENT-TYPE"),
            Some("application/json".to_string())
        );
        let (_, headers, _) = handle.into_parts();
        assert_eq!(headers.len(), 1);
    }
}

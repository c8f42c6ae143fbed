use std::fmt;
use std::io::{self, Read};

use tracing::debug;

/// Chunk size for request body accumulation.
const CHUNK: usize = 8 * 1024;

/// Errors surfaced while accumulating or parsing a request body.
///
/// Delivered exclusively through the `read_body` / `read_json_body`
/// callbacks; body reads never fail synchronously.
#[derive(Debug)]
pub enum BodyError {
    /// Accumulated payload length went past the caller-supplied limit.
    LimitExceeded {
        /// Bytes accumulated when the limit was crossed.
        reached: usize,
        /// The caller-supplied limit.
        limit: usize,
    },
    /// The transport reader failed mid-stream.
    Read(io::Error),
    /// The accumulated text is not valid JSON.
    Parse(serde_json::Error),
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyError::LimitExceeded { reached, limit } => {
                write!(f, "limit exceeded: reached {reached} bytes, limit = {limit}")
            }
            BodyError::Read(err) => write!(f, "body read failed: {err}"),
            BodyError::Parse(err) => write!(f, "body is not valid JSON: {err}"),
        }
    }
}

impl std::error::Error for BodyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BodyError::LimitExceeded { .. } => None,
            BodyError::Read(err) => Some(err),
            BodyError::Parse(err) => Some(err),
        }
    }
}

/// Accumulate a reader into text, honoring an optional byte limit.
///
/// Reads fixed-size chunks and checks the running length after each one, so
/// the limit trips as soon as it is crossed rather than after the whole
/// payload arrived. Accumulated bytes are converted lossily; the payload is
/// treated as text the way the wire delivered it.
pub(crate) fn accumulate(
    reader: &mut dyn Read,
    limit: Option<usize>,
) -> Result<String, BodyError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; CHUNK];
    let mut len = 0usize;
    loop {
        let n = reader.read(&mut chunk).map_err(BodyError::Read)?;
        if n == 0 {
            break;
        }
        len += n;
        if let Some(limit) = limit {
            if len > limit {
                debug!(reached = len, limit, "request body over limit");
                return Err(BodyError::LimitExceeded { reached: len, limit });
            }
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn accumulates_within_limit() {
        let mut reader = Cursor::new(b"hello".to_vec());
        let body = accumulate(&mut reader, Some(16)).unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn no_limit_reads_everything() {
        let payload = vec![b'x'; 3 * CHUNK + 17];
        let mut reader = Cursor::new(payload.clone());
        let body = accumulate(&mut reader, None).unwrap();
        assert_eq!(body.len(), payload.len());
    }

    #[test]
    fn limit_trips_with_reached_length() {
        let mut reader = Cursor::new(b"0123456789".to_vec());
        match accumulate(&mut reader, Some(5)) {
            Err(BodyError::LimitExceeded { reached, limit }) => {
                assert!(reached > limit);
                assert_eq!(limit, 5);
            }
            other => panic!("expected limit error, got {other:?}"),
        }
    }

    #[test]
    fn read_failures_are_reported() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "boom"))
            }
        }
        let mut reader = Failing;
        assert!(matches!(
            accumulate(&mut reader, None),
            Err(BodyError::Read(_))
        ));
    }
}

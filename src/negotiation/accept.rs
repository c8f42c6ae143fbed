use std::collections::HashMap;
use std::fmt;

/// One comma-separated segment of an `Accept` header.
///
/// Splitting is positional and tolerant: everything after the first `;` is
/// kept verbatim as `params` (a `q=0.9` weight lands there and is never
/// interpreted), and a missing `/` leaves the whole segment as the type with
/// no subtype. No whitespace trimming happens here; callers hand over the
/// raw segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptEntry {
    type_: String,
    subtype: Option<String>,
    mime_type: String,
    params: Option<String>,
}

impl AcceptEntry {
    /// Parse one raw header segment.
    pub fn parse(segment: &str) -> Self {
        let (media, params) = match segment.find(';') {
            Some(pos) => (&segment[..pos], Some(segment[pos + 1..].to_string())),
            None => (segment, None),
        };
        let (type_, subtype) = match media.find('/') {
            Some(pos) => (media[..pos].to_string(), Some(media[pos + 1..].to_string())),
            None => (media.to_string(), None),
        };
        let mime_type = match &subtype {
            Some(sub) => format!("{type_}/{sub}").to_lowercase(),
            None => type_.to_lowercase(),
        };
        Self {
            type_,
            subtype,
            mime_type,
            params,
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Normalized lowercase `type/subtype` (or bare `type`).
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw text after the first `;`, if any.
    pub fn params(&self) -> Option<&str> {
        self.params.as_deref()
    }
}

impl fmt::Display for AcceptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type)
    }
}

/// A parsed `Accept` header: the entries in the order the client listed
/// them, plus a lookup map from normalized MIME type to the first entry
/// carrying it.
///
/// The order is the negotiation policy: selection walks entries by
/// position, never by quality weight.
#[derive(Debug, Clone, Default)]
pub struct AcceptSet {
    entries: Vec<AcceptEntry>,
    by_mime: HashMap<String, usize>,
}

impl AcceptSet {
    /// Parse a full header value. One entry per comma-separated segment; on
    /// duplicate MIME types the first occurrence wins in the lookup map.
    pub fn parse(header: &str) -> Self {
        let entries: Vec<AcceptEntry> = header.split(',').map(AcceptEntry::parse).collect();
        let mut by_mime = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_mime.entry(entry.mime_type().to_string()).or_insert(idx);
        }
        Self { entries, by_mime }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AcceptEntry> {
        self.entries.iter()
    }

    /// The client's most-preferred entry by position, or `None` when the
    /// set is empty.
    pub fn first(&self) -> Option<&AcceptEntry> {
        self.entries.first()
    }

    /// First entry with the given normalized MIME type.
    pub fn get(&self, mime_type: &str) -> Option<&AcceptEntry> {
        self.by_mime.get(mime_type).map(|&idx| &self.entries[idx])
    }

    /// Select the first client-listed MIME type available in `candidates`.
    ///
    /// Candidates are matched case-insensitively but returned in their
    /// original casing. Client listing order decides; candidate order and
    /// quality weights do not. An empty intersection yields `None` —
    /// negotiation failure is not an error.
    pub fn preferred<'c, S: AsRef<str>>(&self, candidates: &'c [S]) -> Option<&'c str> {
        if self.entries.is_empty() {
            return None;
        }
        let mut supported: HashMap<String, &'c str> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            let candidate = candidate.as_ref();
            supported.insert(candidate.to_lowercase(), candidate);
        }
        self.entries
            .iter()
            .find_map(|entry| supported.get(entry.mime_type()).copied())
    }
}

/// Errors raised while building an [`AcceptSet`] for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationError {
    /// The request carries no `Accept` header at all. Absence of the header
    /// is the caller's problem to guard; a present-but-odd segment never
    /// fails.
    MissingAcceptHeader,
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::MissingAcceptHeader => {
                write!(f, "request has no accept header")
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use http::Method;
use once_cell::unsync::OnceCell;
use serde_json::Value;
use tracing::debug;

use super::body::{accumulate, BodyError};
use super::chain::{DispatchChain, DispatchStep};
use super::response::ResponseHandle;
use crate::ids::RequestId;
use crate::negotiation::{AcceptEntry, AcceptSet, NegotiationError};
use crate::registry::Registry;
use crate::server::request::{parse_basic_auth, parse_cookies};

/// Parsed basic-auth credentials from the `authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub scheme: String,
    pub username: String,
    pub password: String,
}

/// Everything the transport extracted from the request line and headers.
///
/// Header keys are lowercase. Cookies, credentials, and the body text stay
/// unparsed here; the context derives them lazily on first access.
#[derive(Debug, Default)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

/// The request-scoped facade handlers work against.
///
/// Owns the dispatch chain, the staged response, and populate-once caches
/// for everything derived from the request: cookies, raw body, parsed body,
/// basic auth, and accept entries. One context serves exactly one logical
/// request on one coroutine; interior mutability is plain `Cell`/`RefCell`
/// under that confinement, and the cache accessors are not re-entrant while
/// a cache is being populated.
pub struct RequestContext {
    request_id: RequestId,
    head: RequestHead,
    registry: Arc<dyn Registry>,
    chain: DispatchChain,
    response: ResponseHandle,
    upgrade: bool,
    body_source: RefCell<Option<Box<dyn Read>>>,
    cookies: OnceCell<HashMap<String, String>>,
    basic_auth: OnceCell<Option<BasicCredentials>>,
    body: OnceCell<Option<String>>,
    parsed_body: OnceCell<Value>,
    accepts: OnceCell<AcceptSet>,
}

impl RequestContext {
    /// Build a context for one inbound request.
    ///
    /// `body` is the transport's payload reader; it is consumed at most
    /// once, by the first [`read_body`](Self::read_body) call.
    pub fn new(registry: Arc<dyn Registry>, head: RequestHead, body: Box<dyn Read>) -> Self {
        let request_id =
            RequestId::from_header_or_new(head.headers.get("x-request-id").map(String::as_str));
        Self {
            request_id,
            head,
            registry,
            chain: DispatchChain::new(),
            response: ResponseHandle::new(),
            upgrade: false,
            body_source: RefCell::new(Some(body)),
            cookies: OnceCell::new(),
            basic_auth: OnceCell::new(),
            body: OnceCell::new(),
            parsed_body: OnceCell::new(),
            accepts: OnceCell::new(),
        }
    }

    /// Like [`new`](Self::new), but for an upgrade-connection request
    /// (e.g. a protocol switch). Once the underlying connection is handed
    /// off, request/response close semantics no longer apply, so closedness
    /// is never derived from the response in this mode.
    pub fn new_upgrade(registry: Arc<dyn Registry>, head: RequestHead, body: Box<dyn Read>) -> Self {
        let mut ctx = Self::new(registry, head, body);
        ctx.upgrade = true;
        ctx
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn path(&self) -> &str {
        &self.head.path
    }

    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// Whether the response has been closed. Always false in upgrade mode.
    pub fn is_closed(&self) -> bool {
        !self.upgrade && self.response.is_closed()
    }

    /// The staged response for this request.
    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    /// Consume the context, yielding the staged response for the transport
    /// writer.
    pub fn into_response(self) -> ResponseHandle {
        self.response
    }

    /// Advance the dispatch chain by one step.
    ///
    /// A closed response makes this a no-op, any number of times. Otherwise
    /// the cursor moves: the next before-handler runs, or the terminal
    /// route is delegated to the registry (exactly once), or — when the
    /// route already ran and left the response open — the not-found
    /// fallback fires. Handlers continue the chain by calling this again,
    /// directly or from a downstream completion, or end it by closing the
    /// response.
    pub fn advance(&self) {
        let before = self.registry.before_handlers();
        match self.chain.advance(self.is_closed(), before.len()) {
            DispatchStep::Halted => {}
            DispatchStep::Before(idx) => {
                debug!(request_id = %self.request_id, idx, "before handler invoked");
                before[idx].invoke(self);
            }
            DispatchStep::Route => {
                debug!(
                    request_id = %self.request_id,
                    method = %self.head.method,
                    path = %self.head.path,
                    "route invocation delegated"
                );
                self.registry.invoke_route(self);
            }
            DispatchStep::Fallback => {
                debug!(
                    request_id = %self.request_id,
                    "route left the response open, falling back to not found"
                );
                self.not_found(None);
            }
        }
    }

    /// Alias for [`advance`](Self::advance); reads naturally inside
    /// handlers.
    pub fn next(&self) {
        self.advance();
    }

    // ---- terminal responses ------------------------------------------------

    /// Close the response with a payload via the registry.
    pub fn send(&self, payload: Value) {
        self.registry.send(self, payload);
    }

    /// Stage a status code, then close the response with a payload.
    pub fn send_with_status(&self, status: u16, payload: Value) {
        self.response.set_status(status);
        self.registry.send(self, payload);
    }

    /// Close the response with an error report via the registry.
    pub fn error(&self, err: anyhow::Error) {
        self.registry.error(self, err);
    }

    /// Stage a status code, then close the response with an error report.
    pub fn error_with_status(&self, status: u16, err: anyhow::Error) {
        self.response.set_status(status);
        self.registry.error(self, err);
    }

    /// Close the response with the registry's not-found report.
    pub fn not_found(&self, message: Option<&str>) {
        self.registry.not_found(self, message);
    }

    // ---- request data ------------------------------------------------------

    /// Request header by name; lookup is by lowercase key.
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn request_headers(&self) -> &HashMap<String, String> {
        &self.head.headers
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.head.query_params.get(name).map(String::as_str)
    }

    pub fn set_response_header(&self, name: &str, value: String) {
        self.response.set_header(name, value);
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.response.header(name)
    }

    // ---- lazy caches -------------------------------------------------------

    /// Parsed cookies; populated from the `cookie` header on first access.
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookies
            .get_or_init(|| parse_cookies(&self.head.headers))
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies().get(name).map(String::as_str)
    }

    /// Basic-auth credentials; `None` when the `authorization` header is
    /// absent or malformed. Populated once.
    pub fn basic_auth(&self) -> Option<&BasicCredentials> {
        self.basic_auth
            .get_or_init(|| self.request_header("authorization").and_then(parse_basic_auth))
            .as_ref()
    }

    /// Deliver the raw request body through `callback`.
    ///
    /// The first call consumes the transport reader, accumulating chunks
    /// until the payload ends or `limit` is crossed; later calls replay the
    /// cached outcome without touching the transport again. Failures
    /// (limit, I/O) arrive through the callback and poison the cache: the
    /// body is gone, and later calls observe `Ok(None)`.
    pub fn read_body<F>(&self, limit: Option<usize>, callback: F)
    where
        F: FnOnce(Result<Option<&str>, BodyError>),
    {
        if let Some(cached) = self.body.get() {
            callback(Ok(cached.as_deref()));
            return;
        }
        let source = self.body_source.borrow_mut().take();
        let Some(mut source) = source else {
            callback(Ok(None));
            return;
        };
        match accumulate(source.as_mut(), limit) {
            Ok(text) => {
                debug!(request_id = %self.request_id, bytes = text.len(), "request body cached");
                let cached = self.body.get_or_init(|| Some(text));
                callback(Ok(cached.as_deref()));
            }
            Err(err) => {
                let _ = self.body.set(None);
                callback(Err(err));
            }
        }
    }

    /// Deliver the JSON-parsed request body through `callback`.
    ///
    /// Absent or empty bodies yield `Ok(None)`. A parse failure is reported
    /// through the callback and nothing is cached, so the text can be
    /// re-examined; a parsed value is cached populate-once.
    pub fn read_json_body<F>(&self, limit: Option<usize>, callback: F)
    where
        F: FnOnce(Result<Option<&Value>, BodyError>),
    {
        if let Some(value) = self.parsed_body.get() {
            callback(Ok(Some(value)));
            return;
        }
        self.read_body(limit, |outcome| match outcome {
            Err(err) => callback(Err(err)),
            Ok(None) => callback(Ok(None)),
            Ok(Some(text)) if text.is_empty() => callback(Ok(None)),
            Ok(Some(text)) => match serde_json::from_str::<Value>(text) {
                Ok(value) => callback(Ok(Some(self.parsed_body.get_or_init(|| value)))),
                Err(err) => callback(Err(BodyError::Parse(err))),
            },
        });
    }

    /// The parsed `Accept` header; built once per request.
    ///
    /// An entirely absent header is an error the caller guards against; any
    /// present value parses permissively.
    pub fn accepts(&self) -> Result<&AcceptSet, NegotiationError> {
        if let Some(set) = self.accepts.get() {
            return Ok(set);
        }
        let header = self
            .request_header("accept")
            .ok_or(NegotiationError::MissingAcceptHeader)?;
        Ok(self.accepts.get_or_init(|| AcceptSet::parse(header)))
    }

    /// The client's most-preferred listed type by position, or `None` when
    /// the accept list is empty. Quality weights are never consulted.
    pub fn preferred_content_type(&self) -> Result<Option<&AcceptEntry>, NegotiationError> {
        Ok(self.accepts()?.first())
    }

    /// The original-cased candidate matching the earliest client-listed
    /// MIME type, or `None` when nothing intersects.
    pub fn preferred_content_type_of<'c, S: AsRef<str>>(
        &self,
        candidates: &'c [S],
    ) -> Result<Option<&'c str>, NegotiationError> {
        Ok(self.accepts()?.preferred(candidates))
    }
}

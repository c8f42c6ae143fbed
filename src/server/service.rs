use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use tracing::{debug, info, warn};

use super::request::parse_request;
use super::response::write_response;
use crate::dispatch::RequestContext;
use crate::registry::Registry;

/// HTTP service binding the dispatch engine to `may_minihttp`.
///
/// One [`RequestContext`] per call: the chain is kicked exactly once and
/// runs to quiescence (a handler closed the response, the fallback fired,
/// or a handler stalled) before the staged response is written back.
#[derive(Clone)]
pub struct AppService {
    pub registry: Arc<dyn Registry>,
}

impl AppService {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let (head, body) = parse_request(req);
        let upgrade = head.headers.contains_key("upgrade");
        let method = head.method.clone();
        let path = head.path.clone();

        let registry = Arc::clone(&self.registry);
        let body = Box::new(io::Cursor::new(body));
        let ctx = if upgrade {
            RequestContext::new_upgrade(registry, head, body)
        } else {
            RequestContext::new(registry, head, body)
        };

        info!(
            request_id = %ctx.request_id(),
            method = %method,
            path = %path,
            "request dispatched"
        );

        ctx.advance();

        if ctx.is_upgrade() {
            debug!(
                method = %method,
                path = %path,
                "upgrade request, response left to the connection owner"
            );
            return Ok(());
        }
        if !ctx.is_closed() {
            // cooperative chain: nobody advanced or closed, and no deadline
            // is imposed here
            warn!(
                request_id = %ctx.request_id(),
                method = %method,
                path = %path,
                "chain ended without closing the response"
            );
            return Ok(());
        }
        write_response(res, ctx.into_response());
        Ok(())
    }
}

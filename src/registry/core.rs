use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::dispatch::RequestContext;

/// A pre-processing step run, in registration order, before the terminal
/// route.
///
/// Registration pairs the callable with an optional receiver. The receiver
/// is passed explicitly at invocation instead of being implicitly bound, so
/// a handler that needs shared state names it as a parameter; plain
/// handlers take only the context.
pub struct BeforeHandler {
    callable: Callable,
}

enum Callable {
    Plain(Arc<dyn Fn(&RequestContext) + Send + Sync>),
    Bound {
        func: Arc<dyn Fn(&(dyn Any + Send + Sync), &RequestContext) + Send + Sync>,
        receiver: Arc<dyn Any + Send + Sync>,
    },
}

impl BeforeHandler {
    /// A handler with no receiver; the context is its only argument.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        Self {
            callable: Callable::Plain(Arc::new(f)),
        }
    }

    /// A handler bound to a receiver supplied at registration time.
    pub fn with_receiver<F>(receiver: Arc<dyn Any + Send + Sync>, f: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync), &RequestContext) + Send + Sync + 'static,
    {
        Self {
            callable: Callable::Bound {
                func: Arc::new(f),
                receiver,
            },
        }
    }

    /// Invoke the handler for one request.
    pub fn invoke(&self, ctx: &RequestContext) {
        match &self.callable {
            Callable::Plain(f) => f(ctx),
            Callable::Bound { func, receiver } => func(receiver.as_ref(), ctx),
        }
    }
}

/// The collaborator supplying the ordered before-list and owning every
/// terminal response.
///
/// All terminal-route invocation funnels through `invoke_route` so route
/// handling stays centralized in one place rather than letting handlers
/// invoke routes directly. The responder methods (`send`, `error`,
/// `not_found`) give handlers one uniform way to close the response.
pub trait Registry: Send + Sync {
    /// Ordered before-handlers applied to every request.
    fn before_handlers(&self) -> &[BeforeHandler];

    /// Invoke the terminal route for this request.
    fn invoke_route(&self, ctx: &RequestContext);

    /// Close the response with a payload.
    fn send(&self, ctx: &RequestContext, payload: Value);

    /// Close the response with an error report.
    fn error(&self, ctx: &RequestContext, err: anyhow::Error);

    /// Close the response with a not-found report.
    fn not_found(&self, ctx: &RequestContext, message: Option<&str>);
}

/// Shared route handler signature.
pub type RouteFn = Arc<dyn Fn(&RequestContext) + Send + Sync>;

/// In-memory [`Registry`]: an ordered before-list plus an exact
/// method-and-path route table.
///
/// Lookup is exact. A request with no matching route hands control back to
/// the chain, whose fallback arm produces the not-found response.
#[derive(Default)]
pub struct HandlerRegistry {
    before: Vec<BeforeHandler>,
    routes: HashMap<(Method, String), RouteFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a before-handler. Registration order is execution order.
    pub fn add_before(&mut self, handler: BeforeHandler) {
        self.before.push(handler);
    }

    /// Register a route. Registering the same method and path twice
    /// replaces the earlier handler.
    pub fn add_route<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        let replaced = self
            .routes
            .insert((method.clone(), path.to_string()), Arc::new(handler))
            .is_some();
        if replaced {
            warn!(%method, path, "replaced existing route handler");
        } else {
            info!(
                %method,
                path,
                total_routes = self.routes.len(),
                "route registered"
            );
        }
    }
}

impl Registry for HandlerRegistry {
    fn before_handlers(&self) -> &[BeforeHandler] {
        &self.before
    }

    fn invoke_route(&self, ctx: &RequestContext) {
        let key = (ctx.method().clone(), ctx.path().to_string());
        match self.routes.get(&key) {
            Some(route) => {
                debug!(method = %ctx.method(), path = ctx.path(), "route invoked");
                route(ctx);
            }
            None => {
                // no route for this request: hand control back to the
                // chain, whose fallback arm produces the not-found
                debug!(method = %ctx.method(), path = ctx.path(), "no route registered");
                ctx.advance();
            }
        }
    }

    fn send(&self, ctx: &RequestContext, payload: Value) {
        if ctx.response().header("content-type").is_none() {
            ctx.set_response_header("content-type", "application/json".to_string());
        }
        ctx.response().finish(serde_json::to_vec(&payload).unwrap());
    }

    fn error(&self, ctx: &RequestContext, err: anyhow::Error) {
        let staged = ctx.response().status();
        let status = if staged >= 400 { staged } else { 500 };
        error!(
            request_id = %ctx.request_id(),
            status,
            error = %err,
            "request failed"
        );
        ctx.response().set_status(status);
        self.send(ctx, json!({ "error": err.to_string() }));
    }

    fn not_found(&self, ctx: &RequestContext, message: Option<&str>) {
        debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = ctx.path(),
            "not found"
        );
        ctx.response().set_status(404);
        self.send(
            ctx,
            json!({
                "error": message.unwrap_or("Not Found"),
                "method": ctx.method().as_str(),
                "path": ctx.path(),
            }),
        );
    }
}

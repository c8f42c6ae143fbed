use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use http::Method;
use serde_json::json;
use tracing::info;

use restflow::registry::{BeforeHandler, HandlerRegistry};
use restflow::runtime_config::RuntimeConfig;
use restflow::server::{AppService, HttpServer};

/// Demo dispatch service: a request-logging before-handler, a health
/// route, and an echo route that negotiates its response representation.
#[derive(Parser, Debug)]
#[command(name = "restflow", about = "Run the restflow demo service")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = RuntimeConfig::from_env();
    may::config().set_stack_size(config.stack_size);

    let mut registry = HandlerRegistry::new();
    registry.add_before(BeforeHandler::new(|ctx| {
        info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = ctx.path(),
            "inbound request"
        );
        ctx.advance();
    }));

    registry.add_route(Method::GET, "/health", |ctx| {
        ctx.send(json!({ "status": "ok" }));
    });

    let body_limit = config.body_limit;
    registry.add_route(Method::POST, "/echo", move |ctx| {
        let candidates = ["application/json", "text/plain"];
        let representation = ctx
            .preferred_content_type_of(&candidates)
            .unwrap_or(Some("application/json"));
        ctx.read_json_body(Some(body_limit), |outcome| match outcome {
            Ok(body) => match representation {
                Some("text/plain") => {
                    ctx.set_response_header("content-type", "text/plain".to_string());
                    ctx.response().finish(
                        body.map(|v| v.to_string()).unwrap_or_default().into_bytes(),
                    );
                }
                _ => ctx.send(json!({ "echo": body })),
            },
            Err(err) => ctx.error_with_status(400, anyhow::Error::new(err)),
        });
    });

    let service = AppService::new(Arc::new(registry));
    info!(addr = %args.addr, stack_size = config.stack_size, "starting server");
    let handle = HttpServer(service).start(args.addr.as_str())?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server exited abnormally"))?;
    Ok(())
}

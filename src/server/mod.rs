pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_basic_auth, parse_cookies, parse_query_params, parse_request};
pub use response::write_response;
pub use service::AppService;

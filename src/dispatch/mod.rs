//! Per-request dispatch: the chain state machine, the request-scoped
//! context facade, body accumulation, and the staged response handle.
//!
//! Dispatch is cooperative and strictly sequential: one step is active at a
//! time, and the chain makes no progress unless a handler calls
//! [`RequestContext::advance`] (or closes the response). Each step may
//! itself suspend before signaling completion by advancing again, which is
//! why every transition re-checks the closed flag first.

mod body;
mod chain;
mod context;
mod response;

pub use body::BodyError;
pub use chain::{DispatchChain, DispatchStep};
pub use context::{BasicCredentials, RequestContext, RequestHead};
pub use response::{HeaderVec, ResponseHandle, MAX_INLINE_HEADERS};

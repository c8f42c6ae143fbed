mod core;

pub use core::{BeforeHandler, HandlerRegistry, Registry, RouteFn};

mod accept;

pub use accept::{AcceptEntry, AcceptSet, NegotiationError};

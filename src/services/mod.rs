//! Service layer for library consumers
//!
//! `FaultSession` wires the engine, its worker and the cluster watchers
//! together so embedders do not have to.

pub mod session;

pub use session::{FaultSession, SessionCollaborators};

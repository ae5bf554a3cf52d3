//! FluentRouter and pipeline setup.
//!
//! - [`router`] - Core `FluentRouter` struct, backends and accessors
//! - [`observability`] - Access log
//! - [`request`] - Request parsing and request IDs
//! - [`features`] - Static assets, sessions, content blocks, crawlers, locale
//! - [`auth`] - CAS authentication stage
//! - [`control`] - Panic catching and background maintenance
//! - [`builder`] - Orchestration (setup_pipeline, into_inner, start)

mod auth;
mod builder;
mod control;
mod features;
mod observability;
mod request;
mod router;
mod shutdown;

pub use router::FluentRouter;
pub use shutdown::{ShutdownNotifier, ShutdownPhase};

#[cfg(test)]
mod tests;

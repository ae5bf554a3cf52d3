//! # sso-web
//!
//! A server-rendered web application behind a reverse proxy, with CAS
//! single sign-on, configured through TOML.
//!
//! Every request passes an ordered pipeline of stages before it reaches a
//! route:
//!
//! | Stage | Does |
//! |-------|------|
//! | `access-log` | Request span with method, URI, request ID and user |
//! | `static-assets` | Serves `{prefix}/static`, including `browserConfig` |
//! | `request-parsing` | Cookies, JSON and form bodies, payload limit |
//! | `session` | Signed cookie session |
//! | `authentication` | Principal from the session, single logout |
//! | `content-blocks` | Shared page fragments per locale |
//! | `crawler-redirect` | Session-free pages for search engine bots |
//! | `locale` | Language cookie and request language |
//!
//! Routes are declared in a [`RouteTable`] and may carry gates: the hard
//! [`Authentication::server_login`] gate sends anonymous visitors to CAS,
//! the soft [`Authentication::server_gateway_login`] gate tries one silent
//! CAS round trip and continues anonymously.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sso_web::{Config, FluentRouter, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_rust_env()?;  // Loads config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     FluentRouter::new(config)?
//!         .setup_pipeline()?
//!         .setup_default_routes()
//!         .start()
//!         .await
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! host_url = "http://localhost:3000"
//! session_secret = "{{ SESSION_SECRET }}"
//!
//! [http]
//! port = 3000
//!
//! [proxy_prefix_path]
//! uri = "/app"
//!
//! [cas]
//! server_url = "https://cas.example.com/cas"
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ldap` | Enriches CAS principals from an LDAP directory |
//! | `redis` | Shares the content block cache through redis |
//!
//! # Custom Routes
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use sso_web::{Config, FluentRouter, RequestContext, RouteId, RouteSpec};
//!
//! async fn profile(ctx: RequestContext) -> String {
//!     ctx.principal.map(|p| p.username).unwrap_or_default()
//! }
//!
//! # fn example() -> sso_web::Result<()> {
//! let router = FluentRouter::new(Config::from_rust_env()?)?.setup_pipeline()?;
//! let gate = router.authentication().server_login();
//! let app = router
//!     .setup_default_routes()
//!     .route(RouteSpec::get(RouteId::Custom("app.profile"), "/app/profile", get(profile)).gated(gate))
//!     .into_inner()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Handlers and stages return [`Result`]. An [`Error`] turns into a JSON
//! response with the status of its [`ErrorKind`]:
//!
//! ```json
//! {
//!   "error_code": "NOT_FOUND",
//!   "message": "File not found: /app/static/missing.js"
//! }
//! ```
mod assets;
mod auth;
mod blocks;
mod config;
mod context;
mod crawler;
mod error;
mod fluent;
mod i18n;
mod locale;
mod parsing;
mod pipeline;
mod routes;
mod state;
mod utils;
mod views;

pub use assets::*;
pub use auth::*;
pub use blocks::*;
pub use config::*;
pub use context::{ParsedBody, RequestContext, context_mut};
pub use crawler::*;
pub use error::*;
pub use fluent::*;
pub use i18n::translate;
pub use locale::*;
pub use parsing::*;
pub use pipeline::{AfterResponse, Outcome, Pipeline, Stage};
pub use routes::{RouteId, RouteIndex, RouteSpec, RouteTable, default_routes};
pub use state::AppState;
pub use utils::*;
pub use views::*;

pub type Result<T> = std::result::Result<T, Error>;

//!
//! The route table.
//!
//! Routes are declared as [`RouteSpec`]s with a stable [`RouteId`], checked
//! as a whole at startup and only then handed to axum. The table order is
//! the order of the `_paths` listing and of `window.paths`.
//!

mod app;
mod system;

use {
    crate::{
        Authentication, Config, Error, HttpMiddleware, Result,
        auth::{Gate, handlers},
        state::AppState,
    },
    axum::{
        Router,
        routing::{MethodRouter, get, post},
    },
    http::Method,
    serde::Serialize,
    serde_json::{Map, Value, json},
    std::{collections::HashSet, fmt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    Monitor,
    About,
    Paths,
    Robots,
    Index,
    Gateway,
    CasLogin,
    CasGateway,
    CasLogout,
    CasPgtCallback,
    CasSingleLogout,
    CasGatewaySingleLogout,
    /// Application routes added next to the defaults.
    Custom(&'static str),
}

impl RouteId {
    pub fn name(&self) -> &'static str {
        match self {
            RouteId::Monitor => "system.monitor",
            RouteId::About => "system.about",
            RouteId::Paths => "system.paths",
            RouteId::Robots => "system.robots",
            RouteId::Index => "system.index",
            RouteId::Gateway => "system.gateway",
            RouteId::CasLogin => "cas.login",
            RouteId::CasGateway => "cas.gateway",
            RouteId::CasLogout => "cas.logout",
            RouteId::CasPgtCallback => "cas.pgtCallback",
            RouteId::CasSingleLogout => "cas.singleLogout",
            RouteId::CasGatewaySingleLogout => "cas.gatewaySingleLogout",
            RouteId::Custom(name) => name,
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct RouteSpec {
    pub id: RouteId,
    pub method: Method,
    pub path: String,
    pub gates: Vec<Gate>,
    handler: MethodRouter<AppState>,
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("gates", &self.gates)
            .finish()
    }
}

impl RouteSpec {
    /// `handler` must answer `method`, e.g. `get(handler)` for [`Method::GET`].
    pub fn new(
        id: RouteId,
        method: Method,
        path: impl Into<String>,
        handler: MethodRouter<AppState>,
    ) -> Self {
        RouteSpec {
            id,
            method,
            path: path.into(),
            gates: Vec::new(),
            handler,
        }
    }

    pub fn get(id: RouteId, path: impl Into<String>, handler: MethodRouter<AppState>) -> Self {
        Self::new(id, Method::GET, path, handler)
    }

    pub fn post(id: RouteId, path: impl Into<String>, handler: MethodRouter<AppState>) -> Self {
        Self::new(id, Method::POST, path, handler)
    }

    /// Adds a gate. Gates run in the order they are added.
    pub fn gated(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    fn into_method_router(self) -> MethodRouter<AppState> {
        self.gates
            .iter()
            .rev()
            .fold(self.handler, |route, gate| gate.apply(route))
    }
}

/// Route name to `{method, uri}`, in table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RouteIndex(Map<String, Value>);

impl RouteIndex {
    pub fn uri(&self, name: &str) -> Option<&str> {
        self.0.get(name)?.get("uri")?.as_str()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: RouteSpec) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn with(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    pub fn into_routes(self) -> Vec<RouteSpec> {
        self.routes
    }

    /// Checks the table before it is turned into a router. Any gate needs
    /// the authentication stage.
    pub fn validate(&self, authentication_mounted: bool) -> Result<()> {
        let mut ids = HashSet::new();
        let mut endpoints = HashSet::new();

        for route in &self.routes {
            if !ids.insert(route.id) {
                return Err(Error::config(format!("duplicate route id {}", route.id)));
            }
            if route.path.is_empty() || !route.path.starts_with('/') {
                return Err(Error::config(format!(
                    "route {} has path `{}`, paths must start with '/'",
                    route.id, route.path
                )));
            }
            if !endpoints.insert((route.method.clone(), route.path.as_str())) {
                return Err(Error::config(format!(
                    "route {} duplicates {} {}",
                    route.id, route.method, route.path
                )));
            }
            if let Some(gate) = route.gates.first().filter(|_| !authentication_mounted) {
                return Err(Error::config(format!(
                    "route {} has a {} gate but the authentication stage is not mounted",
                    route.id,
                    gate.name()
                )));
            }
        }
        Ok(())
    }

    pub fn index(&self) -> RouteIndex {
        RouteIndex(
            self.routes
                .iter()
                .map(|route| {
                    (
                        route.id.name().to_string(),
                        json!({ "method": route.method.as_str(), "uri": route.path }),
                    )
                })
                .collect(),
        )
    }

    /// Lowercases every path, for routers that match case-insensitively.
    pub fn case_folded(mut self) -> Self {
        for route in &mut self.routes {
            route.path = route.path.to_lowercase();
        }
        self
    }

    pub fn into_router(self) -> Router<AppState> {
        self.routes.into_iter().fold(Router::new(), |router, route| {
            let path = route.path.clone();
            router.route(&path, route.into_method_router())
        })
    }
}

/// The built-in routes. Without the authentication stage the pages are
/// served ungated and the CAS callbacks are left out.
pub fn default_routes(config: &Config, auth: &Authentication) -> RouteTable {
    let p = |path: &str| config.prefixed(path);
    let mut table = RouteTable::new();

    table
        .push(RouteSpec::get(RouteId::Monitor, p("/_monitor"), get(system::monitor)))
        .push(RouteSpec::get(RouteId::About, p("/_about"), get(system::about)))
        .push(RouteSpec::get(RouteId::Paths, p("/_paths"), get(system::paths)))
        .push(RouteSpec::get(RouteId::Robots, "/robots.txt", get(system::robots)));

    if !config.is_middleware_enabled(HttpMiddleware::Authentication) {
        table
            .push(RouteSpec::get(RouteId::Index, p("/"), get(app::index)))
            .push(RouteSpec::get(RouteId::Gateway, p("/gateway"), get(app::index)));
        return table;
    }

    table
        .push(RouteSpec::get(RouteId::Index, p("/"), get(app::index)).gated(auth.server_login()))
        .push(
            RouteSpec::get(RouteId::Gateway, p("/gateway"), get(app::index))
                .gated(auth.server_gateway_login("/")),
        )
        .push(RouteSpec::get(RouteId::CasLogin, p("/login"), get(handlers::login)))
        .push(RouteSpec::get(
            RouteId::CasGateway,
            p("/loginGateway"),
            get(handlers::login_gateway),
        ))
        .push(RouteSpec::get(RouteId::CasLogout, p("/logout"), get(handlers::logout)));

    if auth.pgt_callback_enabled() {
        table.push(RouteSpec::get(
            RouteId::CasPgtCallback,
            p("/pgtCallback"),
            get(handlers::pgt_callback),
        ));
    }

    table
        .push(RouteSpec::post(
            RouteId::CasSingleLogout,
            p("/login"),
            post(handlers::single_logout),
        ))
        .push(RouteSpec::post(
            RouteId::CasGatewaySingleLogout,
            p("/loginGateway"),
            post(handlers::single_logout),
        ));
    table
}

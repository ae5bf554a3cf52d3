use {
    super::{Authentication, GATEWAY_KEY, found},
    crate::{
        context::context,
        pipeline::{Outcome, Stage, layer_route},
        utils::with_query,
    },
    axum::{extract::Request, routing::MethodRouter},
    futures_util::future::BoxFuture,
    http::Method,
    std::sync::Arc,
};

/// A per-route precondition, mounted as a layer on a single route.
#[derive(Clone)]
pub struct Gate {
    name: &'static str,
    stage: Arc<dyn Stage>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Gate").field(&self.name).finish()
    }
}

impl Gate {
    pub(crate) fn login(auth: Authentication) -> Self {
        Gate {
            name: "login",
            stage: Arc::new(LoginGate { auth }),
        }
    }

    pub(crate) fn gateway(auth: Authentication, fallback: &str) -> Self {
        Gate {
            name: "gateway",
            stage: Arc::new(GatewayGate {
                auth,
                fallback: fallback.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        layer_route(route, self.stage.clone())
    }
}

fn path_and_query(request: &Request) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn is_authenticated(request: &Request) -> bool {
    context(request).is_some_and(|ctx| ctx.is_authenticated())
}

struct LoginGate {
    auth: Authentication,
}

impl Stage for LoginGate {
    fn name(&self) -> &'static str {
        "login"
    }

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            if is_authenticated(&request) {
                return Outcome::Declined(request);
            }
            let next = path_and_query(&request);
            let target = with_query(&self.auth.login_path(), &[("nextUrl", next.as_str())]);
            Outcome::Handled(found(&target))
        })
    }
}

struct GatewayGate {
    auth: Authentication,
    fallback: String,
}

impl Stage for GatewayGate {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            if is_authenticated(&request) {
                return Outcome::Declined(request);
            }
            let Some(session) = context(&request).and_then(|ctx| ctx.session.clone()) else {
                return Outcome::Declined(request);
            };
            match session.get::<bool>(GATEWAY_KEY).await {
                Ok(Some(true)) => return Outcome::Declined(request),
                Ok(_) => {}
                Err(e) => return Outcome::Failed(e.into()),
            }

            let next = if matches!(*request.method(), Method::GET | Method::HEAD) {
                path_and_query(&request)
            } else {
                self.auth.prefixed(&self.fallback)
            };
            let service = self.auth.gateway_service(Some(&next), Some(&self.fallback));
            let target = self.auth.cas_login_url(&service, &[("gateway", "true")]);
            Outcome::Handled(found(&target))
        })
    }
}

//!
//! The ordered request pipeline.
//!
//! A [`Stage`] looks at a request and either answers it, hands it on, or
//! fails it. The [`Pipeline`] keeps the mounted stages in the canonical
//! order of [`HttpMiddleware::PIPELINE`] and turns them into axum layers,
//! the first mount becoming the outermost layer.
//!

use {
    crate::{Error, HttpMiddleware, Result},
    axum::{
        Router,
        extract::Request,
        middleware::{self, Next},
        response::{IntoResponse, Response},
        routing::MethodRouter,
    },
    futures_util::future::BoxFuture,
    std::{fmt, sync::Arc},
};

/// Applied to the response of a request a stage passed on.
pub type AfterResponse = Box<dyn FnOnce(&mut Response) + Send>;

/// The result of offering a request to a stage.
pub enum Outcome {
    /// The stage produced the response. Later stages and routes never run.
    Handled(Response),
    /// The stage passes the (possibly annotated) request on.
    Declined(Request),
    /// As `Declined`, and the hook runs on whatever response comes back.
    DeclinedThen(Request, AfterResponse),
    /// The request ends with the error's status.
    Failed(Error),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Handled(response) => write!(f, "Handled({})", response.status()),
            Outcome::Declined(request) => write!(f, "Declined({})", request.uri()),
            Outcome::DeclinedThen(request, _) => write!(f, "DeclinedThen({})", request.uri()),
            Outcome::Failed(error) => write!(f, "Failed({error})"),
        }
    }
}

pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome>;
}

pub(crate) async fn run_stage(stage: Arc<dyn Stage>, request: Request, next: Next) -> Response {
    match stage.attempt(request).await {
        Outcome::Declined(request) => next.run(request).await,
        Outcome::DeclinedThen(request, after) => {
            let mut response = next.run(request).await;
            after(&mut response);
            response
        }
        Outcome::Handled(response) => {
            tracing::trace!(stage = stage.name(), status = %response.status(), "request handled");
            response
        }
        Outcome::Failed(error) => {
            tracing::debug!(stage = stage.name(), error = %error, "request failed");
            error.into_response()
        }
    }
}

/// Wraps a single route in `stage`.
pub(crate) fn layer_route<S>(route: MethodRouter<S>, stage: Arc<dyn Stage>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.layer(middleware::from_fn(move |request: Request, next: Next| {
        run_stage(stage.clone(), request, next)
    }))
}

type ApplyLayer<S> = Box<dyn FnOnce(Router<S>) -> Router<S> + Send>;

enum Mount<S> {
    Stage(Arc<dyn Stage>),
    Layer(ApplyLayer<S>),
}

pub struct Pipeline<S = ()> {
    mounts: Vec<(HttpMiddleware, Mount<S>)>,
}

impl<S> Default for Pipeline<S> {
    fn default() -> Self {
        Pipeline { mounts: Vec::new() }
    }
}

impl<S> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mounts.iter().map(|(kind, _)| kind.name()))
            .finish()
    }
}

impl<S> Pipeline<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stage(&mut self, kind: HttpMiddleware, stage: Arc<dyn Stage>) -> Result<()> {
        self.check_order(kind)?;
        self.mounts.push((kind, Mount::Stage(stage)));
        Ok(())
    }

    /// Mounts a tower layer (access log, session) at the position of `kind`.
    pub fn push_layer<F>(&mut self, kind: HttpMiddleware, apply: F) -> Result<()>
    where
        F: FnOnce(Router<S>) -> Router<S> + Send + 'static,
    {
        self.check_order(kind)?;
        self.mounts.push((kind, Mount::Layer(Box::new(apply))));
        Ok(())
    }

    pub fn contains(&self, kind: HttpMiddleware) -> bool {
        self.mounts.iter().any(|(k, _)| *k == kind)
    }

    /// Mounted stages, outermost first.
    pub fn stages(&self) -> Vec<HttpMiddleware> {
        self.mounts.iter().map(|(k, _)| *k).collect()
    }

    fn check_order(&self, kind: HttpMiddleware) -> Result<()> {
        let position = kind
            .position()
            .ok_or_else(|| Error::config(format!("{kind} is not a pipeline stage")))?;

        if let Some((last, _)) = self.mounts.last() {
            if *last == kind {
                return Err(Error::config(format!("{kind} is already mounted")));
            }
            if last.position().is_some_and(|p| p > position) {
                return Err(Error::config(format!(
                    "{kind} must be mounted before {last}"
                )));
            }
        }
        Ok(())
    }

    /// Wraps `router` in every mount.
    pub fn assemble(self, router: Router<S>) -> Router<S> {
        self.mounts
            .into_iter()
            .rev()
            .fold(router, |router, (_, mount)| match mount {
                Mount::Stage(stage) => {
                    router.layer(middleware::from_fn(move |request: Request, next: Next| {
                        run_stage(stage.clone(), request, next)
                    }))
                }
                Mount::Layer(apply) => apply(router),
            })
    }
}

//! Panic catching and the background maintenance task.

use super::router::FluentRouter;
use crate::{Config, HttpMiddleware, state::AppState};

use {
    axum::Router,
    http::{Response, StatusCode},
    std::time::Duration,
    tokio_util::task::AbortOnDropHandle,
    tower_http::catch_panic::CatchPanicLayer,
};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Turns panics in handlers and stages into `500 Internal Server Error`.
///
/// The panic message is logged and, when a channel was set with
/// [`FluentRouter::with_panic_notification_channel`], sent there. Can only
/// be switched off through `[http.middleware]`, which tests do.
pub(crate) fn apply_catch_panic(
    router: Router<AppState>,
    config: &Config,
    panic_channel: Option<tokio::sync::mpsc::Sender<String>>,
) -> Router<AppState> {
    if !config.is_middleware_enabled(HttpMiddleware::CatchPanic) {
        return router;
    }

    router.layer(CatchPanicLayer::custom(
        move |err: Box<dyn std::any::Any + Send + 'static>| {
            let msg = if let Some(s) = err.downcast_ref::<String>() {
                format!("Service panicked: {}", s)
            } else if let Some(s) = err.downcast_ref::<&str>() {
                format!("Service panicked: {}", s)
            } else {
                "`CatchPanic` was unable to downcast the panic info".to_string()
            };

            tracing::error!("{}", msg);
            if let Some(ch) = &panic_channel {
                ch.try_send(msg).ok();
            }

            // Must not panic inside the panic handler.
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body("Internal Server Error".to_string())
                .unwrap_or_else(|_| Response::new("Internal Server Error".to_string()))
        },
    ))
}

impl FluentRouter {
    /// Prunes expired revocations, unclaimed proxy-granting tickets and
    /// expired content blocks once a minute. The task stops at shutdown and
    /// is aborted when the returned handle is dropped.
    pub(crate) fn spawn_maintenance(&self) -> AbortOnDropHandle<()> {
        let auth = self.state.auth.clone();
        let cache = self.state.blocks.as_ref().map(|b| b.cache().clone());
        let token = self.cancellation_token();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("maintenance task stopping");
                        break;
                    }
                    _ = tokio::time::sleep(MAINTENANCE_INTERVAL) => {
                        auth.prune();
                        if let Some(cache) = &cache {
                            cache.prune();
                        }
                        tracing::trace!("expired tickets and blocks pruned");
                    }
                }
            }
        });

        AbortOnDropHandle::new(handle)
    }
}

//! Orchestration: setup_pipeline(), into_inner(), start().

use super::router::FluentRouter;
use super::shutdown::{ShutdownNotifier, ShutdownPhase};
use crate::{Config, Error, HttpMiddleware, Result, routes::default_routes};

use {
    axum::Router,
    http::Uri,
    std::{net::SocketAddr, time::Duration},
    tokio::signal,
};

impl FluentRouter {
    /// Mounts every pipeline stage the configuration enables, in pipeline
    /// order:
    ///
    /// 1. **Access log** - request span and response line
    /// 2. **Static assets** - files under `{prefix}/static` and `browserConfig`
    /// 3. **Request parsing** - cookies, JSON and form bodies, size limit
    /// 4. **Session** - signed session cookie
    /// 5. **Authentication** - principal from the session, revoked logins dropped
    /// 6. **Content blocks** - shared page fragments for the request locale
    /// 7. **Crawler redirect** - session-free page for search engine bots
    /// 8. **Locale** - language cookie, request language
    ///
    /// Request ID and panic recovery are not stages. They wrap the assembled
    /// pipeline in [`FluentRouter::into_inner`].
    ///
    /// To mount a partial pipeline call the individual `setup_*` methods in
    /// the same order, or exclude stages in `[http.middleware]`.
    pub fn setup_pipeline(self) -> Result<Self> {
        const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        tracing::info!("Starting {PACKAGE_NAME} version {VERSION}...");

        let router = self
            .setup_access_log()?
            .setup_static_assets()?
            .setup_request_parsing()?
            .setup_session()?
            .setup_authentication()?
            .setup_content_blocks()?
            .setup_crawler_redirect()?
            .setup_locale()?;

        tracing::debug!(stages = ?router.pipeline, "pipeline mounted");
        Ok(router)
    }

    /// Adds the built-in routes (monitor, about, paths, robots, the start
    /// page and, with authentication, the CAS callbacks) to the table.
    #[must_use]
    pub fn setup_default_routes(mut self) -> Self {
        for route in default_routes(&self.config, &self.state.auth).into_routes() {
            self.routes.push(route);
        }
        self
    }

    /// Checks the route table against the pipeline and assembles the final
    /// router.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid route table: duplicate
    /// ids or endpoints, relative paths, or gates without the authentication
    /// stage.
    pub fn into_inner(self) -> Result<Router> {
        let FluentRouter {
            config,
            state,
            pipeline,
            routes,
            panic_channel,
            ..
        } = self;

        let authentication_mounted = pipeline.contains(HttpMiddleware::Authentication);
        routes.validate(authentication_mounted)?;
        if state.paths.set(routes.index()).is_err() {
            tracing::warn!("route index was already published, keeping the first one");
        }

        let routes = if config.http.case_sensitive_routing {
            routes
        } else {
            let folded = routes.case_folded();
            folded.validate(authentication_mounted)?;
            folded
        };

        let router = pipeline.assemble(routes.into_router().fallback(no_route));
        let router = super::request::apply_request_id(router, &config);
        let router = super::control::apply_catch_panic(router, &config, panic_channel);
        let router = router.with_state(state);

        Ok(if config.http.case_sensitive_routing {
            router
        } else {
            super::features::fold_path_case(router, config.static_prefix())
        })
    }

    /// Starts the HTTP server and serves until SIGTERM or SIGINT.
    ///
    /// With `http.use_ssl` the server terminates TLS itself using the PEM
    /// files from `[http.ssl]`. Shutdown follows the phases of
    /// [`ShutdownPhase`], in-flight requests get `http.shutdown_timeout`.
    pub async fn start(self) -> Result<()> {
        let config = self.config.clone();
        let notifier = self.shutdown_notifier.clone();
        let _maintenance = self.spawn_maintenance();
        let router = self.into_inner()?;

        if config.http.use_ssl {
            serve_tls(router, &config, notifier).await
        } else {
            serve_plain(router, &config, notifier).await
        }
    }
}

async fn no_route(uri: Uri) -> Error {
    Error::not_found(format!("No route for {}", uri.path()))
}

async fn serve_plain(router: Router, config: &Config, notifier: ShutdownNotifier) -> Result<()> {
    let bind_addr = config.http.full_bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Bound to {}", &bind_addr);
    tracing::info!("Waiting for connections");

    let service = router.into_make_service_with_connect_info::<SocketAddr>();
    let shutdown_timeout = config.http.shutdown_timeout;
    let mut shutdown_rx = notifier.subscribe();

    let serve_future = axum::serve(listener, service).with_graceful_shutdown(
        shutdown_signal_with_notifications(shutdown_timeout, notifier.clone()),
    );

    // The timeout only starts once a signal was received.
    tokio::select! {
        result = serve_future => {
            tracing::info!("Graceful shutdown completed");
            result?;
        }
        _ = async {
            loop {
                match shutdown_rx.recv().await {
                    Ok(ShutdownPhase::Initiated) => break,
                    Ok(_) => continue,
                    Err(_) => return,
                }
            }
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            notifier.emit(ShutdownPhase::GracePeriodEnded);
        }
    }

    Ok(())
}

async fn serve_tls(router: Router, config: &Config, notifier: ShutdownNotifier) -> Result<()> {
    let tls = config.http.ssl.rustls_config().await?;

    let bind_addr = config.http.full_bind_addr();
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| Error::config(format!("invalid bind address {bind_addr}: {e}")))?;

    let handle = axum_server::Handle::new();
    let shutdown_timeout = config.http.shutdown_timeout;
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal_with_notifications(shutdown_timeout, notifier.clone()).await;
            handle.graceful_shutdown(Some(shutdown_timeout));
            tokio::time::sleep(shutdown_timeout).await;
            notifier.emit(ShutdownPhase::GracePeriodEnded);
        }
    });

    tracing::info!("Bound to {} (TLS)", addr);
    tracing::info!("Waiting for connections");

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then emits [`ShutdownPhase::Initiated`] and
/// [`ShutdownPhase::GracePeriodStarted`].
///
/// If a signal handler cannot be installed the function logs a warning and
/// waits on the other one.
pub(crate) async fn shutdown_signal_with_notifications(
    timeout: Duration,
    notifier: ShutdownNotifier,
) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
        timeout.as_secs()
    );
    let subscriber_count = notifier.emit(ShutdownPhase::Initiated);
    tracing::debug!(
        "Shutdown initiated notification sent to {} subscriber(s)",
        subscriber_count
    );
    notifier.emit(ShutdownPhase::GracePeriodStarted { timeout });
}

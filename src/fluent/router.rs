//! Core FluentRouter struct and initialization methods.

use tokio_util::sync::CancellationToken;

use {
    super::shutdown::ShutdownNotifier,
    crate::{
        Authentication, BlockCache, BlockFetcher, CasBackend, CasClient, Config, DirectoryClient,
        HttpMiddleware, NoDirectory, Pipeline, Renderer, Result, RouteSpec, RouteTable,
        state::AppState,
    },
    std::{
        sync::{Arc, OnceLock},
        time::SystemTime,
    },
    tokio::sync::broadcast,
};

/// Fluent builder for the application router.
///
/// `FluentRouter` owns the validated configuration, the shared [`AppState`],
/// the request [`Pipeline`] and the [`RouteTable`]. Stages are mounted with
/// the `setup_*` methods in pipeline order, routes with
/// [`FluentRouter::setup_default_routes`] and [`FluentRouter::route`]. The
/// whole thing is checked and assembled by [`FluentRouter::into_inner`] or
/// served by [`FluentRouter::start`].
///
/// ```rust,no_run
/// use sso_web::{Config, FluentRouter};
///
/// # async fn example() -> sso_web::Result<()> {
/// FluentRouter::new(Config::from_rust_env()?)?
///     .setup_pipeline()?
///     .setup_default_routes()
///     .start()
///     .await
/// # }
/// ```
///
/// Backends are replaced with the `with_*` methods. Call them before any
/// `setup_*` method, the stages and gates capture the backend they were
/// built with.
pub struct FluentRouter {
    pub(crate) config: Arc<Config>,
    pub(crate) state: AppState,
    pub(crate) pipeline: Pipeline<AppState>,
    pub(crate) routes: RouteTable,
    pub(crate) panic_channel: Option<tokio::sync::mpsc::Sender<String>>,
    pub(crate) shutdown_notifier: ShutdownNotifier,
}

impl FluentRouter {
    /// Validates `config` and builds the CAS client, the directory client,
    /// the view renderer and the block fetcher it asks for.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A required view is missing from the views directory
    /// - An HTTP client or the redis client cannot be built
    pub fn new(config: Config) -> Result<FluentRouter> {
        config.validate()?;
        let config = Arc::new(config);

        let cas: Arc<dyn CasBackend> = Arc::new(CasClient::new(&config)?);
        let auth = Authentication::new(&config, cas, directory_from_config(&config));
        let views = Renderer::new(&config)?;

        let blocks = if config.is_middleware_enabled(HttpMiddleware::ContentBlocks)
            && config.block_api.is_enabled()
        {
            let cache = BlockFetcher::cache_from_config(&config)?;
            Some(BlockFetcher::new(&config.block_api, cache)?)
        } else {
            None
        };

        let state = AppState {
            config: config.clone(),
            views,
            auth,
            blocks,
            paths: Arc::new(OnceLock::new()),
            started: SystemTime::now(),
            environment: std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".into()),
        };

        Ok(FluentRouter {
            config,
            state,
            pipeline: Pipeline::new(),
            routes: RouteTable::new(),
            panic_channel: None,
            shutdown_notifier: ShutdownNotifier::default(),
        })
    }

    /// Replaces the CAS server client, e.g. with a fake in tests.
    #[must_use]
    pub fn with_cas_backend(mut self, cas: Arc<dyn CasBackend>) -> Self {
        let directory = self.state.auth.directory().clone();
        self.state.auth = Authentication::new(&self.config, cas, directory);
        self
    }

    /// Replaces the directory used to enrich principals.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        let cas = self.state.auth.cas().clone();
        self.state.auth = Authentication::new(&self.config, cas, directory);
        self
    }

    /// Replaces the content block cache. Does nothing when content blocks
    /// are not configured.
    pub fn with_block_cache(mut self, cache: Arc<dyn BlockCache>) -> Result<Self> {
        if self.state.blocks.is_some() {
            self.state.blocks = Some(BlockFetcher::new(&self.config.block_api, cache)?);
        }
        Ok(self)
    }

    /// Adds a route next to the ones already in the table.
    #[must_use]
    pub fn route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Replaces the whole route table.
    #[must_use]
    pub fn routes(self, routes: RouteTable) -> Self {
        Self { routes, ..self }
    }

    /// Sets a channel that receives the message of every caught panic.
    #[must_use]
    pub fn with_panic_notification_channel(
        self,
        channel: tokio::sync::mpsc::Sender<String>,
    ) -> Self {
        Self {
            panic_channel: Some(channel),
            ..self
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The authentication service, for building gates on custom routes.
    pub fn authentication(&self) -> &Authentication {
        &self.state.auth
    }

    /// Mounted stages, outermost first.
    pub fn stages(&self) -> Vec<HttpMiddleware> {
        self.pipeline.stages()
    }

    #[must_use]
    pub fn shutdown_notifier(&self) -> &ShutdownNotifier {
        &self.shutdown_notifier
    }

    /// Returns a cancellation token that is triggered when shutdown begins.
    ///
    /// Same as `router.shutdown_notifier().cancellation_token()`.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown_notifier.cancellation_token()
    }

    #[must_use]
    pub fn subscribe_to_shutdown(&self) -> broadcast::Receiver<super::shutdown::ShutdownPhase> {
        self.shutdown_notifier.subscribe()
    }
}

fn directory_from_config(config: &Config) -> Arc<dyn DirectoryClient> {
    match &config.ldap {
        #[cfg(feature = "ldap")]
        Some(ldap) => Arc::new(crate::LdapDirectory::new(ldap.clone())),
        #[cfg(not(feature = "ldap"))]
        Some(_) => {
            tracing::warn!(
                "[ldap] is configured but the 'ldap' feature is not enabled, principals will not be enriched"
            );
            Arc::new(NoDirectory)
        }
        None => Arc::new(NoDirectory),
    }
}

//! Shutdown notifications.
//!
//! On SIGTERM or SIGINT the server stops accepting connections and drains
//! in-flight requests for `http.shutdown_timeout`. Background work can
//! follow along in two ways:
//!
//! - a [`CancellationToken`], cancelled as soon as shutdown starts. The
//!   ticket and block cache maintenance task stops on it.
//! - a [`ShutdownNotifier`] subscription, which receives every
//!   [`ShutdownPhase`] in order.
//!
//! ```rust,no_run
//! use sso_web::{Config, FluentRouter, ShutdownPhase};
//!
//! # async fn example() -> sso_web::Result<()> {
//! let router = FluentRouter::new(Config::from_rust_env()?)?;
//! let mut shutdown_rx = router.subscribe_to_shutdown();
//!
//! tokio::spawn(async move {
//!     while let Ok(phase) = shutdown_rx.recv().await {
//!         if let ShutdownPhase::GracePeriodStarted { timeout } = phase {
//!             tracing::info!("draining for {}s", timeout.as_secs());
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// The phases of a graceful shutdown, emitted in this order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// A signal was received. The cancellation token is triggered and no
    /// new connections are accepted.
    Initiated,

    /// In-flight requests get `timeout` to complete.
    GracePeriodStarted { timeout: Duration },

    /// The timeout expired, remaining requests are abandoned.
    GracePeriodEnded,
}

/// Broadcasts [`ShutdownPhase`]s and owns the shutdown cancellation token.
///
/// Clones share the same channel and token.
#[derive(Clone)]
pub struct ShutdownNotifier {
    sender: broadcast::Sender<ShutdownPhase>,
    cancel_token: CancellationToken,
}

impl ShutdownNotifier {
    /// `capacity` is the number of unread phases buffered per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribers only see phases emitted after they subscribed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn is_shutdown_initiated(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Sends `phase` to every subscriber and returns how many received it.
    /// [`ShutdownPhase::Initiated`] also cancels the token.
    pub(crate) fn emit(&self, phase: ShutdownPhase) -> usize {
        if phase == ShutdownPhase::Initiated {
            self.cancel_token.cancel();
        }
        self.sender.send(phase).unwrap_or(0)
    }
}

impl Default for ShutdownNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownNotifier")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("is_shutdown_initiated", &self.is_shutdown_initiated())
            .finish()
    }
}

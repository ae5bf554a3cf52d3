//! CAS authentication.

use super::router::FluentRouter;
use crate::{HttpMiddleware, Result};

impl FluentRouter {
    /// Mounts the authentication stage.
    ///
    /// The stage loads the [`Principal`](crate::Principal) stored by a CAS
    /// login from the session and puts it in the request context and the
    /// request span. Sessions whose login was ended by CAS single logout are
    /// flushed. Gated routes need this stage, and the stage needs sessions.
    ///
    /// ```toml
    /// [cas]
    /// server_url = "https://cas.example.com/cas"
    ///
    /// [auth]
    /// admin_group = "CN=app-admins,OU=Groups,DC=example,DC=com"
    /// ```
    pub fn setup_authentication(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::Authentication) {
            return Ok(self);
        }

        self.pipeline
            .push_stage(HttpMiddleware::Authentication, self.state.auth.stage())?;
        Ok(self)
    }
}

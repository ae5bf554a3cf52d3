//!
//! Directory lookups that enrich a CAS principal.
//!

use {crate::Result, futures_util::future::BoxFuture, std::collections::BTreeMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryEntry {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub attributes: BTreeMap<String, Vec<String>>,
}

pub trait DirectoryClient: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// The entry for `username`, `None` when the directory has no such user.
    fn lookup<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<Option<DirectoryEntry>>>;

    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Used when no `[ldap]` section is configured. Principals carry only what
/// CAS released.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl DirectoryClient for NoDirectory {
    fn name(&self) -> &'static str {
        "none"
    }

    fn lookup<'a>(&'a self, _username: &'a str) -> BoxFuture<'a, Result<Option<DirectoryEntry>>> {
        Box::pin(async { Ok(None) })
    }
}

#[cfg(feature = "ldap")]
pub use self::ldap::LdapDirectory;

#[cfg(feature = "ldap")]
mod ldap {
    use {
        super::{DirectoryClient, DirectoryEntry},
        crate::{LdapConfig, Result},
        futures_util::future::BoxFuture,
        ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, ldap_escape},
    };

    pub struct LdapDirectory {
        config: LdapConfig,
    }

    impl LdapDirectory {
        pub fn new(config: LdapConfig) -> Self {
            LdapDirectory { config }
        }

        async fn connect(&self) -> Result<Ldap> {
            let settings = LdapConnSettings::new().set_conn_timeout(self.config.timeout);
            let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url).await?;
            ldap3::drive!(conn);
            ldap.with_timeout(self.config.timeout);

            if let Some(bind_dn) = &self.config.bind_dn {
                ldap.simple_bind(bind_dn, &self.config.password.0)
                    .await?
                    .success()?;
            }
            Ok(ldap)
        }

        fn filter_for(&self, username: &str) -> String {
            self.config
                .user_filter
                .replace("{username}", &ldap_escape(username))
        }
    }

    impl DirectoryClient for LdapDirectory {
        fn name(&self) -> &'static str {
            "ldap"
        }

        fn lookup<'a>(
            &'a self,
            username: &'a str,
        ) -> BoxFuture<'a, Result<Option<DirectoryEntry>>> {
            Box::pin(async move {
                let mut ldap = self.connect().await?;
                let (entries, _) = ldap
                    .search(
                        &self.config.base,
                        Scope::Subtree,
                        &self.filter_for(username),
                        &self.config.attributes,
                    )
                    .await?
                    .success()?;
                if let Err(e) = ldap.unbind().await {
                    tracing::debug!(error = %e, "ldap unbind failed");
                }

                let Some(entry) = entries.into_iter().next() else {
                    return Ok(None);
                };
                let entry = SearchEntry::construct(entry);
                let first = |name: &str| entry.attrs.get(name).and_then(|v| v.first()).cloned();
                Ok(Some(DirectoryEntry {
                    display_name: first("displayName"),
                    email: first("mail"),
                    groups: entry.attrs.get("memberOf").cloned().unwrap_or_default(),
                    attributes: entry.attrs.clone().into_iter().collect(),
                }))
            })
        }

        fn health(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                let mut ldap = self.connect().await?;
                ldap.unbind().await?;
                Ok(())
            })
        }
    }

}

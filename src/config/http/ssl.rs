use {
    crate::{Error, Result, Sensitive},
    axum_server::tls_rustls::RustlsConfig,
    serde::Deserialize,
};

///
/// TLS material for `use_ssl = true`.
///
/// Either a PEM pair (`cert` and `key`, with an optional `ca` chain appended
/// to the certificate) or a PKCS#12 bundle (`pfx`) unlocked with
/// `passphrase`.
///
/// ```toml
/// [http.ssl]
/// cert = "/etc/ssl/app.pem"
/// key = "/etc/ssl/app.key"
/// ca = "/etc/ssl/chain.pem"
/// ```
///
/// ```toml
/// [http.ssl]
/// pfx = "/etc/ssl/app.pfx"
/// passphrase = "{{ SSL_PASSPHRASE }}"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SslConfig {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub ca: Option<String>,
    pub pfx: Option<String>,
    #[serde(default)]
    pub passphrase: Option<Sensitive<String>>,
}

impl SslConfig {
    pub fn validate(&self) -> Result<()> {
        let has_pem = self.cert.is_some() || self.key.is_some();
        if let Some(pfx) = self.pfx.as_deref() {
            if pfx.is_empty() {
                return Err(Error::config("http.ssl.pfx must not be empty"));
            }
            if has_pem {
                return Err(Error::config(
                    "http.ssl.pfx cannot be combined with http.ssl.cert / http.ssl.key",
                ));
            }
            return Ok(());
        }

        if self.passphrase.is_some() {
            return Err(Error::config(
                "http.ssl.passphrase unlocks http.ssl.pfx, encrypted PEM keys are not supported",
            ));
        }
        if self.cert.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config(
                "http.use_ssl requires http.ssl.cert (PEM certificate path) or http.ssl.pfx",
            ));
        }
        if self.key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config(
                "http.use_ssl requires http.ssl.key (PEM private key path)",
            ));
        }
        Ok(())
    }

    /// Reads the configured files into a rustls server configuration.
    pub async fn rustls_config(&self) -> Result<RustlsConfig> {
        // Fails only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        if let Some(pfx_path) = self.pfx.as_deref() {
            let bundle = read_file(pfx_path, "http.ssl.pfx").await?;
            let passphrase = self.passphrase.as_ref().map(|p| p.0.as_str()).unwrap_or("");
            let (chain, key) = decode_pkcs12(&bundle, passphrase)?;
            return RustlsConfig::from_der(chain, key)
                .await
                .map_err(|e| Error::tls(format!("invalid certificate or key in {pfx_path}: {e}")));
        }

        let (Some(cert_path), Some(key_path)) = (self.cert.as_deref(), self.key.as_deref()) else {
            return Err(Error::tls("http.use_ssl requires http.ssl.cert and http.ssl.key"));
        };
        let mut cert = read_file(cert_path, "http.ssl.cert").await?;
        if let Some(ca_path) = self.ca.as_deref() {
            cert.push(b'\n');
            cert.extend(read_file(ca_path, "http.ssl.ca").await?);
        }
        let key = read_file(key_path, "http.ssl.key").await?;

        RustlsConfig::from_pem(cert, key)
            .await
            .map_err(|e| Error::tls(format!("invalid certificate or key: {e}")))
    }
}

/// The DER certificate chain and PKCS#8 private key stored in a PKCS#12
/// bundle.
pub fn decode_pkcs12(bundle: &[u8], passphrase: &str) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let keystore = p12_keystore::KeyStore::from_pkcs12(bundle, passphrase)
        .map_err(|e| Error::tls(format!("cannot open PKCS#12 bundle: {e}")))?;
    let Some((_alias, entry)) = keystore.private_key_chain() else {
        return Err(Error::tls("PKCS#12 bundle holds no private key"));
    };

    let chain: Vec<Vec<u8>> = entry
        .chain()
        .iter()
        .map(|cert| cert.as_der().to_vec())
        .collect();
    if chain.is_empty() {
        return Err(Error::tls("PKCS#12 bundle holds no certificate"));
    }
    Ok((chain, entry.key().to_vec()))
}

async fn read_file(path: &str, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::tls(format!("cannot read {what} {path}: {e}")))
}

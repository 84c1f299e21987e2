// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Build the rustls server configuration for a group of host mappings that
//! share one listening port.

use crate::ca::{expiry_warning, Ca};
use crate::config::{Config, Paths};
use crate::error::{Error, Result};
use crate::fs::FileSource;
use crate::manager::CertManager;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One `from` -> `to` proxy mapping, optionally pinned to a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Mapping {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl Mapping {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    pub fn with_certificate(
        mut self,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        self.cert_file = Some(cert_file.into());
        self.key_file = Some(key_file.into());
        self
    }

    /// Both certificate and key paths, if the mapping names both.
    pub fn static_files(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// Where handshake certificates come from.
#[derive(Debug, Clone)]
pub enum CertificateSource {
    /// One operator-supplied bundle served for every server name.
    Static(Arc<CertifiedKey>),
    /// Leaves issued per server name by the local CA.
    Dynamic(Arc<CertManager>),
}

impl CertificateSource {
    /// Pick the source for a port group.
    ///
    /// Only the first mapping's `cert-file`/`key-file` are consulted; any
    /// other mapping on the same port shares its certificate.
    pub fn from_mappings(mappings: &[Mapping], fs: &dyn FileSource, paths: &Paths) -> Result<Self> {
        Self::select(mappings, fs, || Ok(paths.clone()))
    }

    fn select(
        mappings: &[Mapping],
        fs: &dyn FileSource,
        paths: impl FnOnce() -> Result<Paths>,
    ) -> Result<Self> {
        let first = mappings.first().ok_or(Error::NoMappings)?;

        match first.static_files() {
            Some((cert, key)) => {
                tracing::info!(
                    host = %first.from,
                    cert = %cert.display(),
                    "serving static certificate"
                );
                Ok(Self::Static(load_static(cert, key, fs)?))
            }
            None => Self::dynamic(&paths()?),
        }
    }

    /// Load the CA under `paths` and issue leaves on demand.
    pub fn dynamic(paths: &Paths) -> Result<Self> {
        let ca = Ca::load_from(paths)?;
        let config = Config::load(&paths.config)?;

        let expiration = ca.check_expiration(config.expiry_threshold());
        if let Some(warning) = expiry_warning(&expiration) {
            tracing::warn!(days_remaining = expiration.days_remaining(), "{}", warning);
        }

        tracing::info!(ca = %paths.ca_cert.display(), "issuing certificates on demand");
        Ok(Self::Dynamic(Arc::new(CertManager::from_ca(&ca)?)))
    }
}

/// Read a PEM certificate chain and private key into a signing bundle.
pub fn load_static(cert_path: &Path, key_path: &Path, fs: &dyn FileSource) -> Result<Arc<CertifiedKey>> {
    use rustls_pemfile::{certs, private_key};

    let cert_pem = fs.read(cert_path).map_err(|e| Error::read(cert_path, e))?;
    let key_pem = fs.read(key_path).map_err(|e| Error::read(key_path, e))?;

    let invalid_cert = |reason: String| Error::InvalidCertificatePem {
        path: cert_path.to_path_buf(),
        reason,
    };
    let invalid_key = |reason: String| Error::InvalidPrivateKeyPem {
        path: key_path.to_path_buf(),
        reason,
    };

    let mut chain = Vec::new();
    for (i, result) in certs(&mut cert_pem.as_slice()).enumerate() {
        let cert =
            result.map_err(|e| invalid_cert(format!("certificate {} in chain: {}", i + 1, e)))?;
        chain.push(cert);
    }
    if chain.is_empty() {
        return Err(invalid_cert("no certificates found".into()));
    }

    let key = private_key(&mut key_pem.as_slice())
        .map_err(|e| invalid_key(e.to_string()))?
        .ok_or_else(|| invalid_key("no private key found".into()))?;
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(|e| invalid_key(e.to_string()))?;

    Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
}

/// Chooses the certificate for each handshake.
#[derive(Debug)]
pub struct CertResolver {
    source: CertificateSource,
}

impl CertResolver {
    pub fn new(source: CertificateSource) -> Self {
        Self { source }
    }

    /// Certificate for a handshake that asked for `server_name`.
    ///
    /// Static bundles ignore the name. Dynamic issuance needs one, and fails
    /// with [`Error::MissingServerName`] without it. Clients connecting by IP
    /// literal send no SNI, so in dynamic mode they are refused; they need a
    /// static certificate on that port.
    pub fn certificate_for(&self, server_name: Option<&str>) -> Result<Arc<CertifiedKey>> {
        match &self.source {
            CertificateSource::Static(key) => Ok(Arc::clone(key)),
            CertificateSource::Dynamic(manager) => {
                let host = server_name.ok_or(Error::MissingServerName)?;
                manager.get_certificate(host)
            }
        }
    }
}

impl ResolvesServerCert for CertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        match self.certificate_for(client_hello.server_name()) {
            Ok(key) => Some(key),
            Err(Error::MissingServerName) => {
                tracing::warn!("rejecting handshake without SNI");
                None
            }
            Err(e) => {
                tracing::error!(
                    host = client_hello.server_name().unwrap_or_default(),
                    error = %e,
                    "failed to provide certificate"
                );
                None
            }
        }
    }
}

/// Server configuration for `source`: TLS 1.3 and 1.2, ALPN `h2` and
/// `http/1.1`, no client authentication.
pub fn server_config(source: CertificateSource) -> Result<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(CertResolver::new(source)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

/// Build the TLS configuration for mappings sharing one port, using the CA
/// in the per-user configuration directory when no static certificate is
/// given.
pub fn build_tls_config(mappings: &[Mapping], fs: &dyn FileSource) -> Result<ServerConfig> {
    server_config(CertificateSource::select(mappings, fs, Paths::new)?)
}

/// Like [`build_tls_config`], with the CA and config file under `paths`.
pub fn build_tls_config_with_paths(
    mappings: &[Mapping],
    fs: &dyn FileSource,
    paths: &Paths,
) -> Result<ServerConfig> {
    server_config(CertificateSource::from_mappings(mappings, fs, paths)?)
}

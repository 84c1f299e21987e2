// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Local development CA and on-the-fly TLS certificates for the uncors proxy.
//!
//! ```rust,no_run
//! use uncors_tls::{build_tls_config, Mapping, OsFileSource};
//!
//! // Needs a CA from `uncors-tls generate-certs`
//! let mappings = vec![Mapping::new("https://app.local", "https://example.com")];
//! let config = build_tls_config(&mappings, &OsFileSource)?;
//! # let _ = config;
//! # Ok::<(), uncors_tls::Error>(())
//! ```

/// Certificate Authority management.
pub mod ca;
/// Leaf certificate issuance.
pub mod cert;
/// Configuration handling.
pub mod config;
/// Error types.
pub mod error;
/// Filesystem utilities.
pub mod fs;
/// TLS listener.
pub mod listener;
/// Per-host certificate cache.
pub mod manager;
/// rustls server configuration.
pub mod tls;
/// X.509 certificate parsing.
pub mod x509;

pub use ca::{
    check_expiration, default_ca_paths, expiry_warning, generate_ca, provision_ca, validate_days,
    Ca, Expiration, CA_COMMON_NAME, CA_ORG_NAME, DEFAULT_EXPIRY_THRESHOLD,
};
pub use cert::{leaf_info, LeafGenerator, LEAF_VALIDITY_DAYS};
pub use config::{Config, Paths, CONFIG_DIR_ENV};
pub use error::{Error, Result};
pub use fs::{FileSource, MemoryFileSource, OsFileSource};
pub use listener::TlsListener;
pub use manager::CertManager;
pub use tls::{
    build_tls_config, build_tls_config_with_paths, server_config, CertResolver, CertificateSource,
    Mapping,
};
pub use x509::{parse_cert_pem, CertInfo};

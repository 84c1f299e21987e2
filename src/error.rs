// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CA certificate not found in {0}. Run 'uncors-tls generate-certs' first.")]
    CaNotFound(PathBuf),

    #[error("CA file already exists at {0}. Use --force to regenerate.")]
    CaAlreadyExists(PathBuf),

    #[error("No host mappings supplied for TLS configuration")]
    NoMappings,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid certificate PEM in {path}: {reason}")]
    InvalidCertificatePem { path: PathBuf, reason: String },

    #[error("Invalid private key PEM in {path}: {reason}")]
    InvalidPrivateKeyPem { path: PathBuf, reason: String },

    #[error("Failed to parse certificate: {0}")]
    CertParse(String),

    #[error("Private key {key} does not match certificate {cert}")]
    KeyMismatch { cert: PathBuf, key: PathBuf },

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Failed to generate serial number: {0}")]
    SerialNumber(String),

    #[error("Certificate generation failed: {0}")]
    CertGen(#[from] rcgen::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("No certificate available for '{host}' and auto-generation is disabled")]
    NoCertificate { host: String },

    #[error("Client sent no server name (SNI); cannot choose a certificate")]
    MissingServerName,

    #[error("Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Invalid validity period: {0}")]
    InvalidDays(String),

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind to {addr}: {reason}\nIs another process using this port?")]
    BindFailed { addr: String, reason: String },

    #[error("Certificate cache lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Map an I/O failure while reading `path`, keeping "missing" distinct.
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path)
        } else {
            Error::ReadFile { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

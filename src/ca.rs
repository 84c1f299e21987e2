// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::config::Paths;
use crate::error::{Error, Result};
use crate::x509::{parse_cert_der, CertInfo};
use rand::TryRngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose, PublicKeyData, SerialNumber,
};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};

pub const CA_COMMON_NAME: &str = "uncors Development CA";
pub const CA_ORG_NAME: &str = "uncors";
pub const CA_COUNTRY: &str = "US";

/// Modulus size of every RSA key this crate generates.
pub const RSA_KEY_BITS: usize = 2048;

/// Remaining CA validity below which operators are warned.
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::days(7);

/// Local root CA used to sign leaf certificates.
pub struct Ca {
    pub key_pair: KeyPair,
    /// Private key as written to disk
    pub key_pem: String,
    pub cert_pem: String,
    pub info: CertInfo,
}

impl std::fmt::Debug for Ca {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ca")
            .field("common_name", &self.info.common_name)
            .field("serial", &self.info.serial_hex())
            .field("not_after", &self.info.expiry_string())
            .finish_non_exhaustive()
    }
}

/// Result of comparing a certificate's `notAfter` against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
    pub expires_soon: bool,
    /// Negative once the certificate has expired
    pub remaining: Duration,
}

impl Expiration {
    pub fn days_remaining(&self) -> i64 {
        self.remaining.whole_days()
    }
}

/// Validate that a validity period is usable.
pub fn validate_days(days: u32) -> Result<()> {
    if days == 0 {
        return Err(Error::InvalidDays("days cannot be 0".into()));
    }
    Ok(())
}

/// Generate a fresh RSA key pair, returned both as the raw key and as a
/// signing key pair.
pub(crate) fn generate_rsa_key() -> Result<(RsaPrivateKey, KeyPair)> {
    let private_key = RsaPrivateKey::new(&mut rand_core::OsRng, RSA_KEY_BITS)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let der = private_key
        .to_pkcs8_der()
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let key_pair = KeyPair::try_from(der.as_bytes())?;
    Ok((private_key, key_pair))
}

/// 128-bit random serial number, kept positive.
pub(crate) fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::SerialNumber(e.to_string()))?;
    bytes[0] &= 0x7f;
    Ok(SerialNumber::from_slice(&bytes))
}

/// Add `days` to `start`, rejecting dates past what X.509 can express.
pub(crate) fn validity_end(start: OffsetDateTime, days: u32) -> Result<OffsetDateTime> {
    start
        .checked_add(Duration::days(i64::from(days)))
        .filter(|end| end.year() <= 9999)
        .ok_or_else(|| Error::InvalidDays(format!("{} days is out of range", days)))
}

impl Ca {
    pub fn generate(days: u32) -> Result<Self> {
        validate_days(days)?;
        let (private_key, key_pair) = generate_rsa_key()?;
        let cert_pem = Self::create_ca_cert(&key_pair, days)?;
        let key_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?
            .to_string();
        let info = crate::x509::parse_cert_pem(&cert_pem)?;

        Ok(Self {
            key_pair,
            key_pem,
            cert_pem,
            info,
        })
    }

    fn create_ca_cert(key_pair: &KeyPair, days: u32) -> Result<String> {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, CA_ORG_NAME);
        dn.push(DnType::CommonName, CA_COMMON_NAME);
        dn.push(DnType::CountryName, CA_COUNTRY);

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.serial_number = Some(random_serial()?);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
        ];

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = validity_end(now, days)?;

        Ok(params.self_signed(key_pair)?.pem())
    }

    /// Load a CA from a PEM certificate and a PEM private key.
    ///
    /// The key may be PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`),
    /// and must belong to the certificate.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = read_pem_file(cert_path)?;
        let key_pem = read_pem_file(key_path)?;

        let info = parse_ca_cert(&cert_pem, cert_path)?;
        let key_pair = parse_private_key(&key_pem, key_path)?;

        if key_pair.der_bytes() != info.public_key_bits.as_slice() {
            return Err(Error::KeyMismatch {
                cert: cert_path.to_path_buf(),
                key: key_path.to_path_buf(),
            });
        }

        Ok(Self {
            key_pair,
            key_pem,
            cert_pem,
            info,
        })
    }

    /// Load the CA stored under `paths`, reporting a missing CA as
    /// [`Error::CaNotFound`].
    pub fn load_from(paths: &Paths) -> Result<Self> {
        if !paths.ca_cert.exists() && !paths.ca_key.exists() {
            return Err(Error::CaNotFound(paths.base.clone()));
        }
        Self::load(&paths.ca_cert, &paths.ca_key)
    }

    /// Load the CA from the per-user configuration directory.
    pub fn load_default() -> Result<Self> {
        Self::load_from(&Paths::new()?)
    }

    /// Write `ca.crt` and `ca.key` (mode `0600`), creating the directory.
    pub fn save(&self, paths: &Paths) -> Result<(PathBuf, PathBuf)> {
        crate::fs::ensure_dir(&paths.base)?;
        crate::fs::atomic_write_secret(&paths.ca_key, self.key_pem.as_bytes())?;
        crate::fs::atomic_write(&paths.ca_cert, self.cert_pem.as_bytes())?;
        Ok((paths.ca_cert.clone(), paths.ca_key.clone()))
    }

    /// Create an Issuer for signing certificates.
    ///
    /// The Issuer takes ownership of its key, so the key pair is rebuilt
    /// from its serialized form.
    pub fn issuer(&self) -> Result<Issuer<'static, KeyPair>> {
        let key_pair = KeyPair::try_from(self.key_pair.serialize_der().as_slice())?;
        Ok(Issuer::from_ca_cert_pem(&self.cert_pem, key_pair)?)
    }

    pub fn check_expiration(&self, threshold: Duration) -> Expiration {
        check_expiration(&self.info, threshold)
    }
}

/// Create a new CA valid for `validity_days` and write it into `output_dir`,
/// overwriting any existing files. Returns the certificate and key paths.
pub fn generate_ca(validity_days: u32, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let ca = Ca::generate(validity_days)?;
    let paths = Paths::with_base(output_dir);
    let saved = ca.save(&paths)?;
    tracing::debug!(
        serial = %ca.info.serial_hex(),
        cert = %saved.0.display(),
        "generated CA"
    );
    Ok(saved)
}

/// Generate the CA under `paths` unless one of its files already exists.
///
/// Without `force` an existing `ca.crt` or `ca.key` is left untouched and
/// reported as [`Error::CaAlreadyExists`].
pub fn provision_ca(paths: &Paths, validity_days: u32, force: bool) -> Result<(PathBuf, PathBuf)> {
    if !force {
        if let Some(existing) = paths.existing_ca_file() {
            return Err(Error::CaAlreadyExists(existing.to_path_buf()));
        }
    }
    generate_ca(validity_days, &paths.base)
}

/// Certificate and key paths of the per-user CA.
pub fn default_ca_paths() -> Result<(PathBuf, PathBuf)> {
    let paths = Paths::new()?;
    Ok((paths.ca_cert, paths.ca_key))
}

/// Report whether `cert` expires within `threshold` of now.
pub fn check_expiration(cert: &CertInfo, threshold: Duration) -> Expiration {
    check_expiration_at(cert, threshold, OffsetDateTime::now_utc())
}

/// Operator warning for a CA inside its expiry threshold, or `None`.
pub fn expiry_warning(expiration: &Expiration) -> Option<String> {
    const HINT: &str = "regenerate it with 'uncors-tls generate-certs --force'";

    let days = expiration.days_remaining();
    if expiration.remaining.is_negative() {
        Some(format!(
            "CA certificate has expired ({} days remaining); {}",
            days, HINT
        ))
    } else if expiration.expires_soon {
        Some(format!(
            "CA certificate expires soon ({} days remaining); {}",
            days, HINT
        ))
    } else {
        None
    }
}

pub fn check_expiration_at(
    cert: &CertInfo,
    threshold: Duration,
    now: OffsetDateTime,
) -> Expiration {
    let remaining = cert.not_after() - now;
    Expiration {
        expires_soon: remaining < threshold,
        remaining,
    }
}

fn read_pem_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::read(path, e))?;
    String::from_utf8(bytes).map_err(|_| Error::ReadFile {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "file is not UTF-8 text"),
    })
}

fn parse_ca_cert(cert_pem: &str, path: &Path) -> Result<CertInfo> {
    let invalid = |reason: String| Error::InvalidCertificatePem {
        path: path.to_path_buf(),
        reason,
    };

    let block = pem::parse(cert_pem).map_err(|e| invalid(format!("no PEM block: {}", e)))?;
    if block.tag() != "CERTIFICATE" {
        return Err(invalid(format!("expected CERTIFICATE, got {}", block.tag())));
    }
    parse_cert_der(block.contents()).map_err(|e| invalid(e.to_string()))
}

pub(crate) fn parse_private_key(key_pem: &str, path: &Path) -> Result<KeyPair> {
    let invalid = |reason: String| Error::InvalidPrivateKeyPem {
        path: path.to_path_buf(),
        reason,
    };

    let block = pem::parse(key_pem).map_err(|e| invalid(format!("no PEM block: {}", e)))?;
    match block.tag() {
        "RSA PRIVATE KEY" => {
            let private_key = RsaPrivateKey::from_pkcs1_der(block.contents())
                .map_err(|e| invalid(e.to_string()))?;
            let der = private_key
                .to_pkcs8_der()
                .map_err(|e| invalid(e.to_string()))?;
            KeyPair::try_from(der.as_bytes()).map_err(|e| invalid(e.to_string()))
        }
        "PRIVATE KEY" => {
            KeyPair::try_from(block.contents()).map_err(|e| invalid(e.to_string()))
        }
        other => Err(invalid(format!(
            "expected RSA PRIVATE KEY or PRIVATE KEY, got {}",
            other
        ))),
    }
}

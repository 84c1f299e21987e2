// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::ca::{generate_rsa_key, random_serial, validity_end, Ca};
use crate::error::{Error, Result};
use crate::x509::{parse_cert_der, CertInfo};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, Issuer, KeyPair,
    KeyUsagePurpose, SanType,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::CertifiedKey;
use std::net::IpAddr;
use time::OffsetDateTime;

/// Validity of every leaf certificate.
pub const LEAF_VALIDITY_DAYS: u32 = 365;

/// Signs leaf certificates with one CA.
///
/// The issuer is immutable after construction and shared freely between
/// threads; every call to [`LeafGenerator::generate_certificate`] uses only
/// its own fresh key and serial.
pub struct LeafGenerator {
    issuer: Issuer<'static, KeyPair>,
    ca_cert_der: CertificateDer<'static>,
}

impl std::fmt::Debug for LeafGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafGenerator").finish_non_exhaustive()
    }
}

impl LeafGenerator {
    pub fn new(ca: &Ca) -> Result<Self> {
        let block = pem::parse(&ca.cert_pem)
            .map_err(|e| Error::CertParse(format!("Failed to parse CA PEM: {}", e)))?;
        Ok(Self {
            issuer: ca.issuer()?,
            ca_cert_der: CertificateDer::from(block.into_contents()),
        })
    }

    /// Issue a certificate for `host`, signed by the CA.
    ///
    /// IP literals get an IP address SAN, everything else a DNS name SAN.
    /// The returned chain is `[leaf, ca]`.
    pub fn generate_certificate(&self, host: &str) -> Result<CertifiedKey> {
        let mut params = leaf_params(host)?;
        params.serial_number = Some(random_serial()?);

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = validity_end(now, LEAF_VALIDITY_DAYS)?;

        let (_, key_pair) = generate_rsa_key()?;
        let cert = params.signed_by(&key_pair, &self.issuer)?;

        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)?;

        tracing::debug!(host, "issued leaf certificate");

        Ok(CertifiedKey::new(
            vec![cert.der().clone(), self.ca_cert_der.clone()],
            signing_key,
        ))
    }
}

fn leaf_params(host: &str) -> Result<CertificateParams> {
    if host.is_empty() {
        return Err(Error::InvalidHost {
            host: host.to_string(),
            reason: "host cannot be empty".into(),
        });
    }

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, host);

    let san = match host.parse::<IpAddr>() {
        Ok(ip) => SanType::IpAddress(ip),
        Err(_) => SanType::DnsName(host.try_into().map_err(|_| Error::InvalidHost {
            host: host.to_string(),
            reason: "not a valid DNS name".into(),
        })?),
    };

    let mut params = CertificateParams::default();
    params.distinguished_name = dn;
    params.subject_alt_names = vec![san];
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    // Strict path validation (openssl -x509_strict, Python 3.13+) requires AKI
    params.use_authority_key_identifier_extension = true;
    Ok(params)
}

/// Parse the leaf of an issued bundle.
pub fn leaf_info(key: &CertifiedKey) -> Result<CertInfo> {
    let leaf = key
        .cert
        .first()
        .ok_or_else(|| Error::CertParse("empty certificate chain".into()))?;
    parse_cert_der(leaf.as_ref())
}

// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Parse X.509 certificates without shelling out to openssl.

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use ::time::OffsetDateTime;
use x509_parser::prelude::*;

/// The parts of a certificate this crate inspects.
#[derive(Debug, Clone)]
pub struct CertInfo {
    pub not_before_timestamp: i64,
    pub not_after_timestamp: i64,
    pub common_name: Option<String>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    /// Big-endian serial number bytes
    pub serial: Vec<u8>,
    pub is_ca: bool,
    pub server_auth: bool,
    /// Contents of the subjectPublicKey bit string (PKCS#1 for RSA)
    pub public_key_bits: Vec<u8>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
}

impl CertInfo {
    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.not_before_timestamp)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Invalid timestamps are treated as already expired.
    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.not_after_timestamp)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn validity(&self) -> ::time::Duration {
        self.not_after() - self.not_before()
    }

    pub fn expiry_string(&self) -> String {
        let dt = self.not_after();
        format!("{}-{:02}-{:02}", dt.year(), dt.month() as u8, dt.day())
    }

    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

pub fn parse_cert_pem(pem_str: &str) -> Result<CertInfo> {
    let pem = ::pem::parse(pem_str)
        .map_err(|e| Error::CertParse(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != "CERTIFICATE" {
        return Err(Error::CertParse(format!(
            "Expected CERTIFICATE, got {}",
            pem.tag()
        )));
    }

    parse_cert_der(pem.contents())
}

pub fn parse_cert_der(der: &[u8]) -> Result<CertInfo> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CertParse(format!("Invalid X.509: {}", e)))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    let mut is_ca = false;
    let mut server_auth = false;
    let mut subject_key_id = None;
    let mut authority_key_id = None;

    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                        GeneralName::IPAddress(bytes) => {
                            if let Some(ip) = ip_from_bytes(bytes) {
                                ip_addresses.push(ip);
                            }
                        }
                        _ => {}
                    }
                }
            }
            ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
            ParsedExtension::ExtendedKeyUsage(eku) => server_auth = eku.server_auth,
            ParsedExtension::SubjectKeyIdentifier(id) => subject_key_id = Some(id.0.to_vec()),
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                authority_key_id = aki.key_identifier.as_ref().map(|id| id.0.to_vec());
            }
            _ => {}
        }
    }

    Ok(CertInfo {
        not_before_timestamp: cert.validity().not_before.timestamp(),
        not_after_timestamp: cert.validity().not_after.timestamp(),
        common_name,
        dns_names,
        ip_addresses,
        serial: cert.tbs_certificate.raw_serial().to_vec(),
        is_ca,
        server_auth,
        public_key_bits: cert.public_key().subject_public_key.data.to_vec(),
        subject_key_id,
        authority_key_id,
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes)
            .ok()
            .map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(bytes)
            .ok()
            .map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Per-host certificate cache in front of the leaf generator.

use crate::ca::Ca;
use crate::cert::LeafGenerator;
use crate::error::{Error, Result};
use rustls::sign::CertifiedKey;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Issues each hostname's certificate at most once per process.
///
/// A single lock guards the whole map, so a miss for one host waits behind
/// issuance for any other host. The hostname set of a local proxy is small,
/// and issuance happens once per host.
#[derive(Debug)]
pub struct CertManager {
    cache: RwLock<HashMap<String, Arc<CertifiedKey>>>,
    generator: Option<LeafGenerator>,
}

impl CertManager {
    pub fn new(generator: LeafGenerator) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            generator: Some(generator),
        }
    }

    pub fn from_ca(ca: &Ca) -> Result<Self> {
        Ok(Self::new(LeafGenerator::new(ca)?))
    }

    /// Static-only mode: only pre-seeded hosts are served.
    pub fn without_ca() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            generator: None,
        }
    }

    /// Return the cached certificate for `host`, issuing it on first use.
    ///
    /// `host` is matched exactly as given.
    pub fn get_certificate(&self, host: &str) -> Result<Arc<CertifiedKey>> {
        {
            let cache = self.cache.read().map_err(|_| Error::LockPoisoned)?;
            if let Some(key) = cache.get(host) {
                tracing::trace!(host, "certificate cache hit");
                return Ok(Arc::clone(key));
            }
        }

        let generator = self.generator.as_ref().ok_or_else(|| Error::NoCertificate {
            host: host.to_string(),
        })?;

        let mut cache = self.cache.write().map_err(|_| Error::LockPoisoned)?;
        // Another handshake may have issued it while we waited
        if let Some(key) = cache.get(host) {
            return Ok(Arc::clone(key));
        }

        let key = Arc::new(generator.generate_certificate(host)?);
        cache.insert(host.to_string(), Arc::clone(&key));
        Ok(key)
    }

    /// Seed the cache. An existing entry for `host` is kept.
    pub fn insert_certificate(&self, host: &str, key: Arc<CertifiedKey>) -> Result<()> {
        let mut cache = self.cache.write().map_err(|_| Error::LockPoisoned)?;
        cache.entry(host.to_string()).or_insert(key);
        Ok(())
    }

    pub fn cached_hosts(&self) -> Result<Vec<String>> {
        let cache = self.cache.read().map_err(|_| Error::LockPoisoned)?;
        let mut hosts: Vec<String> = cache.keys().cloned().collect();
        hosts.sort();
        Ok(hosts)
    }
}

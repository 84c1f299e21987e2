// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use rustls::ServerConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// TCP listener that completes the TLS handshake before handing out
/// connections.
pub struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::BindFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for the next connection that completes a handshake.
    ///
    /// Failed accepts and handshakes are logged and skipped. Handshakes run
    /// one at a time; use [`TlsListener::serve`] to run them concurrently.
    pub async fn accept(&self) -> (TlsStream<TcpStream>, SocketAddr) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                    continue;
                }
            };

            match self.acceptor.accept(stream).await {
                Ok(tls) => return (tls, peer),
                Err(e) => tracing::warn!(%peer, error = %e, "TLS handshake failed"),
            }
        }
    }

    /// Accept forever, handshaking each connection on its own task and
    /// passing established streams to `handler`.
    pub async fn serve<F, Fut>(self, handler: F)
    where
        F: Fn(TlsStream<TcpStream>, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                    continue;
                }
            };

            let acceptor = self.acceptor.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                match acceptor.accept(stream).await {
                    Ok(tls) => handler(tls, peer).await,
                    Err(e) => tracing::warn!(%peer, error = %e, "TLS handshake failed"),
                }
            });
        }
    }
}

impl std::fmt::Debug for TlsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsListener")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

//! HTTPS listener serving the same router as the plain HTTP one.

use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use super::{router, ServerHandle, ServerState};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

fn open(path: &Path) -> Result<BufReader<std::fs::File>, TlsError> {
    std::fs::File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Builds the server config from a PEM certificate chain (`pemPath`) and
/// a PEM private key (`keyPath`, PKCS#8, PKCS#1 or SEC1).
pub fn load_server_config(pem_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, TlsError> {
    let chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut open(pem_path)?)
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::Read {
            path: pem_path.to_path_buf(),
            source,
        })?;
    if chain.is_empty() {
        return Err(TlsError::NoCertificates(pem_path.to_path_buf()));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut open(key_path)?)
        .map_err(|source| TlsError::Read {
            path: key_path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

    // ring (through reqwest) and aws-lc-rs are both linked, so there is no
    // process-wide default provider.
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_tls_server(
    addr: SocketAddr,
    tls: Arc<ServerConfig>,
    state: Arc<ServerState>,
) -> Result<ServerHandle> {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let acceptor = TlsAcceptor::from(tls);
    let app = router(state);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                accept = listener.accept() => match accept {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(acceptor.clone(), stream, peer, app.clone()));
                    }
                    Err(err) => {
                        tracing::warn!(target: "server", error = %err, "https accept failed");
                    }
                },
                _ = &mut shutdown_rx => break,
            }
        }
    });
    tracing::info!(target: "server", addr = %local_addr, "catalogue server listening (https)");

    Ok(ServerHandle {
        addr: local_addr,
        shutdown_tx,
        server_handle: handle,
    })
}

async fn serve_connection(acceptor: TlsAcceptor, stream: TcpStream, peer: SocketAddr, app: Router) {
    let stream = match acceptor.accept(stream).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!(target: "server", %peer, error = %err, "tls handshake failed");
            return;
        }
    };
    let service = TowerToHyperService::new(app);
    if let Err(err) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        tracing::debug!(target: "server", %peer, error = %err, "https connection closed with error");
    }
}

//! In-process TCP servers speaking just enough HTTP/1.1 for tests.

use core::{
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::sync::Arc;

use rustls::{
    crypto,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    ServerConfig,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_rustls::TlsAcceptor;

const CERT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/cert.der"));
const KEY: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/key.der"));

#[derive(Debug)]
pub struct Server {
    pub addr: SocketAddr,
    /// Number of accepted connections.
    pub connections: Arc<AtomicUsize>,
    /// Raw requests received, head and body.
    pub requests: UnboundedReceiver<Vec<u8>>,
}

impl Server {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn num_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Returns all requests received so far as lossy strings.
    pub fn drain_requests(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(req) = self.requests.try_recv() {
            out.push(String::from_utf8_lossy(&req).into_owned());
        }

        out
    }
}

/// Answers every request with the given response, keeping connections open.
pub async fn serve(response: &'static [u8]) -> Server {
    spawn(response, false).await
}

/// Answers the first request on each connection, then closes it.
pub async fn serve_once(response: &'static [u8]) -> Server {
    spawn(response, true).await
}

/// Accepts connections and reads requests, but never responds.
pub async fn blackhole() -> Server {
    spawn(b"", false).await
}

/// Same as [`serve`], but over TLS with a self-signed certificate.
pub async fn serve_tls(response: &'static [u8]) -> Server {
    let cfg = ServerConfig::builder_with_provider(Arc::new(crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(CERT.to_vec())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY.to_vec())),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(cfg));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let (tx, requests) = mpsc::unbounded_channel();

    {
        let connections = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, ..)) = listener.accept().await {
                connections.fetch_add(1, Ordering::SeqCst);
                let acceptor = acceptor.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    if let Ok(stream) = acceptor.accept(stream).await {
                        handle(stream, response, false, tx).await;
                    }
                });
            }
        });
    }

    Server { addr, connections, requests }
}

/// Returns an address nobody listens on.
pub async fn refused() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn spawn(response: &'static [u8], once: bool) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let (tx, requests) = mpsc::unbounded_channel();

    {
        let connections = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, ..)) = listener.accept().await {
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle(stream, response, once, tx.clone()));
            }
        });
    }

    Server { addr, connections, requests }
}

async fn handle<S>(mut stream: S, response: &'static [u8], once: bool, tx: UnboundedSender<Vec<u8>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    while let Some(req) = read_request(&mut stream, &mut buf).await {
        let _ = tx.send(req);
        if response.is_empty() {
            continue;
        }
        if stream.write_all(response).await.is_err() || stream.flush().await.is_err() || once {
            return;
        }
    }
}

async fn read_request<S>(stream: &mut S, buf: &mut Vec<u8>) -> Option<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head_len = pos + 4;
            let head = String::from_utf8_lossy(&buf[..head_len]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            if buf.len() >= head_len + body_len {
                return Some(buf.drain(..head_len + body_len).collect());
            }
        }

        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(..) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

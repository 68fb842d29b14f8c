//! TCP listener implementation with optional TLS termination.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Terminate TLS per connection unless running insecure
//! - Surface accept and handshake errors without ending the accept loop

use std::net::SocketAddr;
use std::path::Path;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::ListenerConfig;
use crate::net::tls::load_tls_acceptor;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to load the TLS identity.
    Tls(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// TLS handshake with the client failed.
    Handshake(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Tls(e) => write!(f, "Failed to load TLS identity: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Handshake(e) => write!(f, "TLS handshake failed: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A byte stream to a client, TLS-wrapped or not.
pub enum ClientStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// A raw connection that has been accepted but not yet established.
///
/// The TLS handshake happens in [`Accepted::establish`] so a slow client never
/// holds up the accept loop.
pub struct Accepted {
    stream: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
}

impl Accepted {
    /// Address of the connecting client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Finish accepting: run the TLS handshake when the listener is secure.
    pub async fn establish(self) -> Result<ClientStream, ListenerError> {
        match self.tls {
            None => Ok(ClientStream::Plain(self.stream)),
            Some(acceptor) => acceptor
                .accept(self.stream)
                .await
                .map(|stream| ClientStream::Tls(Box::new(stream)))
                .map_err(ListenerError::Handshake),
        }
    }
}

/// A TCP listener that optionally terminates TLS.
///
/// There is no connection cap; every accepted connection is handed out.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Present unless listening insecure.
    tls: Option<TlsAcceptor>,
}

impl Listener {
    /// Bind to the configured address, loading the TLS identity unless insecure.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let tls = if config.insecure {
            None
        } else {
            let tls_config = config.tls.as_ref().ok_or_else(|| {
                ListenerError::Tls(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "certificate and private key are required unless insecure",
                ))
            })?;
            let acceptor = load_tls_acceptor(
                Path::new(&tls_config.cert_path),
                Path::new(&tls_config.key_path),
            )
            .await
            .map_err(ListenerError::Tls)?;
            Some(acceptor)
        };

        let listener = TcpListener::bind(config.bind_address.as_str())
            .await
            .map_err(ListenerError::Bind)?;

        let listener = Self::from_parts(listener, tls);
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            tls = listener.is_tls(),
            "Listener bound"
        );

        Ok(listener)
    }

    /// Wrap an already bound socket.
    pub fn from_parts(inner: TcpListener, tls: Option<TlsAcceptor>) -> Self {
        Self { inner, tls }
    }

    /// Accept a new raw connection.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(peer_addr = %peer, "Connection accepted");

        Ok(Accepted {
            stream,
            peer,
            tls: self.tls.clone(),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Whether connections are TLS-wrapped.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }
}

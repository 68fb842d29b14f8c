//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use intercept_proxy::config::ProxyConfig;
use intercept_proxy::net::Listener;
use intercept_proxy::{HttpServer, Shutdown, Transaction};

/// Build a complete HTTP/1.1 response with a matching Content-Length.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));
    out
}

/// Start a mock backend on a free port that answers every connection with
/// `response` and reports each raw request head it saw.
pub async fn start_mock_backend(response: String) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let response = response.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let _ = tx.send(head);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// An address nothing is listening on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A proxy running in the background with an in-memory transaction log.
pub struct RunningProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<Vec<Transaction>>>,
}

impl RunningProxy {
    /// Stop accepting, drain, and return every recorded transaction.
    pub async fn finish(self) -> Vec<Transaction> {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap()
    }
}

/// Bind the proxy on a free local port and start serving.
pub async fn start_proxy(mut config: ProxyConfig) -> RunningProxy {
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.drain_timeout_secs = 5;

    let server = HttpServer::from_config(&config).unwrap();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, Vec::<Transaction>::new(), shutdown.subscribe()));

    RunningProxy { addr, shutdown, task }
}

/// Plain-HTTP proxy config pointed at `target`.
pub fn insecure_config(target: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.insecure = true;
    config.target.url = format!("http://{target}");
    config
}

/// Test client that never routes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

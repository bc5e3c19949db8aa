//! TCP debug server

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::protocol::{DebugCommand, DebugResponse};

/// Trait that the application implements to handle debug commands
pub trait DebugHandler: Send + Sync + 'static {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse;
}

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("failed to bind debug server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Debug server handle - keep this alive to keep the server running
pub struct DebugServer {
    addr: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl DebugServer {
    /// Start the debug server on localhost. Must be called inside a tokio runtime.
    /// Bind errors are logged; the server then simply never answers.
    pub fn start(handler: Arc<Mutex<dyn DebugHandler>>, port: u16) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let handle = tokio::spawn(async move {
            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    log::info!("Debug server listening on {}", addr);
                    serve(listener, handler).await;
                }
                Err(e) => log::error!("Failed to bind debug server on {}: {}", addr, e),
            }
        });
        Self { addr, _handle: handle }
    }

    /// Bind first and report failure to the caller. Port 0 picks a free port.
    pub async fn bind(handler: Arc<Mutex<dyn DebugHandler>>, addr: SocketAddr) -> Result<Self, DebugError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| DebugError::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(|source| DebugError::Bind { addr, source })?;
        log::info!("Debug server listening on {}", addr);
        let handle = tokio::spawn(serve(listener, handler));
        Ok(Self { addr, _handle: handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn serve(listener: TcpListener, handler: Arc<Mutex<dyn DebugHandler>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::info!("Debug client connected from {}", peer);
                let handler = handler.clone();
                tokio::spawn(async move {
                    handle_connection(stream, handler).await;
                    log::info!("Debug client disconnected: {}", peer);
                });
            }
            Err(e) => log::error!("Debug server accept error: {}", e),
        }
    }
}

/// Answer one request line.
pub async fn respond(line: &str, handler: &Mutex<dyn DebugHandler>) -> String {
    let response = match serde_json::from_str::<DebugCommand>(line) {
        Ok(cmd) => {
            log::debug!("Debug command: {:?}", cmd);
            handler.lock().await.handle_command(cmd)
        }
        Err(e) => DebugResponse::error(format!("Invalid command JSON: {}", e)),
    };
    let mut json = serde_json::to_string(&response).unwrap_or_else(|e| {
        format!("{{\"status\":\"error\",\"message\":\"Serialize error: {}\"}}", e)
    });
    json.push('\n');
    json
}

async fn handle_connection(stream: TcpStream, handler: Arc<Mutex<dyn DebugHandler>>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Debug server read error: {}", e);
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = respond(trimmed, &handler).await;
        if let Err(e) = writer.write_all(reply.as_bytes()).await {
            log::error!("Debug server write error: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseData;

    struct Echo;

    impl DebugHandler for Echo {
        fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
            match cmd {
                DebugCommand::Ping => DebugResponse::pong(),
                _ => DebugResponse::ok(ResponseData::None),
            }
        }
    }

    #[tokio::test]
    async fn test_respond() {
        let handler: Arc<Mutex<dyn DebugHandler>> = Arc::new(Mutex::new(Echo));
        let reply = respond(r#"{"cmd":"Ping"}"#, &handler).await;
        assert!(reply.ends_with('\n'));
        assert!(reply.contains("pong"));

        let reply = respond("not json", &handler).await;
        assert!(reply.contains("\"status\":\"error\""));
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let handler: Arc<Mutex<dyn DebugHandler>> = Arc::new(Mutex::new(Echo));
        let server = DebugServer::bind(handler, SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();

        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"cmd\":\"Ping\"}\n").await.unwrap();

        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["status"], "ok");
        assert_eq!(response["data"]["message"], "pong");
    }
}

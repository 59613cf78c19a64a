// system-tests/tests/helpers/client.rs
// ============================================================================
// Module: Endpoint Client
// Description: Line-protocol client for the reference metastore endpoint.
// Purpose: Talk to a running metastore the way a test workload would.
// Dependencies: tokio, serde_json, metastore-harness-sqlite
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use metastore_harness_sqlite::Response;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Connected endpoint client.
pub struct EndpointClient {
    /// Buffered connection.
    stream: BufReader<TcpStream>,
}

impl EndpointClient {
    /// Connects to `host:port`, retrying until `timeout` elapses.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, String> {
        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            match TcpStream::connect((host, port)).await {
                Ok(stream) => {
                    return Ok(Self {
                        stream: BufReader::new(stream),
                    });
                }
                Err(err) if start.elapsed() > timeout => {
                    return Err(format!("endpoint connect failed after {attempts} attempts: {err}"));
                }
                Err(_) => sleep(Duration::from_millis(25)).await,
            }
        }
    }

    /// Sends one request line and decodes the JSON reply.
    pub async fn call(&mut self, request: &str) -> Result<Response, String> {
        self.stream
            .get_mut()
            .write_all(format!("{request}\n").as_bytes())
            .await
            .map_err(|err| format!("write failed: {err}"))?;
        let mut line = String::new();
        let read =
            self.stream.read_line(&mut line).await.map_err(|err| format!("read failed: {err}"))?;
        if read == 0 {
            return Err("endpoint closed the connection".to_string());
        }
        serde_json::from_str(line.trim_end()).map_err(|err| format!("bad response {line}: {err}"))
    }

    /// Opens a transaction and returns its id.
    pub async fn open_txn(&mut self, user: &str) -> Result<i64, String> {
        match self.call(&format!("OPEN_TXN {user}")).await? {
            Response::TxnOpened {
                txn_id,
            } => Ok(txn_id),
            other => Err(format!("unexpected open_txn reply: {}", other.to_line().trim_end())),
        }
    }

    /// Returns the prepared transaction tables.
    pub async fn schema(&mut self) -> Result<Vec<String>, String> {
        match self.call("SCHEMA").await? {
            Response::Schema {
                tables,
            } => Ok(tables),
            other => Err(format!("unexpected schema reply: {}", other.to_line().trim_end())),
        }
    }
}

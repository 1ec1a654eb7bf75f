//! In-process HTTP server for exercising the client against scripted responses.
//!
//! Each accepted connection is answered with the next scripted
//! [`MockResponse`]; every response closes its connection so the client never
//! reuses a socket the script has moved past.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::core::config::ConnectionConfig;

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Clone, Debug)]
enum Body {
    Fixed {
        content_type: &'static str,
        body: String,
    },
    /// Chunked lines; `hold_open` keeps the connection open after the last one.
    Lines { lines: Vec<String>, hold_open: bool },
    /// Writes `head`, waits for `gate`, then writes `tail` and ends.
    Gated {
        head: Vec<String>,
        tail: Vec<String>,
        gate: Arc<Notify>,
    },
    Stall,
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    status: u16,
    body: Body,
}

impl MockResponse {
    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: Body::Fixed {
                content_type: "text/plain",
                body: body.to_string(),
            },
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: Body::Fixed {
                content_type: "application/json",
                body: body.to_string(),
            },
        }
    }

    /// A complete newline-delimited JSON stream, one chunk per line.
    pub fn ndjson(lines: &[&str]) -> Self {
        Self::lines(lines, false)
    }

    /// Like [`MockResponse::ndjson`] but the body never ends.
    pub fn ndjson_then_stall(lines: &[&str]) -> Self {
        Self::lines(lines, true)
    }

    /// NDJSON stream whose `tail` lines are only sent once `gate` is notified.
    pub fn ndjson_gated(head: &[&str], tail: &[&str], gate: Arc<Notify>) -> Self {
        Self {
            status: 200,
            body: Body::Gated {
                head: terminated(head),
                tail: terminated(tail),
                gate,
            },
        }
    }

    /// Accept the request and never answer it.
    pub fn stall() -> Self {
        Self {
            status: 200,
            body: Body::Stall,
        }
    }

    fn lines(lines: &[&str], hold_open: bool) -> Self {
        Self {
            status: 200,
            body: Body::Lines {
                lines: terminated(lines),
                hold_open,
            },
        }
    }
}

fn terminated(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        bypass_proxies();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(request) = read_http_request(&mut stream).await else {
                    continue;
                };
                captured.lock().await.push(request);
                if let Some(open) = write_response(stream, response).await {
                    held.push(open);
                }
            }
            // Keep stalled connections alive until the server is dropped.
            std::future::pending::<()>().await;
            drop(held);
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            task,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.base_url)
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a local port that nothing listens on.
pub async fn closed_port_url() -> String {
    bypass_proxies();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}")
}

// reqwest reads proxy settings from the environment when a client is built.
fn bypass_proxies() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    std::env::set_var("no_proxy", "127.0.0.1,localhost");
}

async fn write_response(mut stream: TcpStream, response: MockResponse) -> Option<TcpStream> {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown");
    let status_line = format!("HTTP/1.1 {} {}\r\n", response.status, reason);

    match response.body {
        Body::Fixed { content_type, body } => {
            let head = format!(
                "{status_line}content-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(body.as_bytes()).await;
            let _ = stream.shutdown().await;
            None
        }
        Body::Lines { lines, hold_open } => {
            let head = format!(
                "{status_line}content-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes()).await;
            write_chunks(&mut stream, &lines).await;
            if hold_open {
                return Some(stream);
            }
            let _ = stream.write_all(b"0\r\n\r\n").await;
            let _ = stream.shutdown().await;
            None
        }
        Body::Gated { head, tail, gate } => {
            let head_bytes = format!(
                "{status_line}content-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n"
            );
            let _ = stream.write_all(head_bytes.as_bytes()).await;
            write_chunks(&mut stream, &head).await;
            gate.notified().await;
            write_chunks(&mut stream, &tail).await;
            let _ = stream.write_all(b"0\r\n\r\n").await;
            let _ = stream.shutdown().await;
            None
        }
        Body::Stall => Some(stream),
    }
}

async fn write_chunks(stream: &mut TcpStream, lines: &[String]) {
    for line in lines {
        let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
        let _ = stream.write_all(chunk.as_bytes()).await;
        let _ = stream.flush().await;
    }
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.ok_or_else(|| "Missing header terminator".to_string())?;
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length.saturating_sub(body.len())];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest { method, path, body })
}

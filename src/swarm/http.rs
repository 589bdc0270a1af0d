//! Minimal HTTP endpoint for manager and worker control traffic
//!
//! Accepts one request per connection and answers with a plain text body.

use super::protocol::ACKNOWLEDGEMENT;
use crate::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Largest request body accepted
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Largest request line plus headers accepted
const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Time allowed to receive a complete request
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Parsed inbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Response written back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// `200 OK` with the acknowledgement body
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: ACKNOWLEDGEMENT.to_string(),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: format!("{}\n", message),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Handles decoded requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: HttpRequest) -> HttpResponse;
}

/// Background HTTP server
pub struct HttpServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl HttpServer {
    /// Bind to `addr` and serve requests with `handler` until shut down
    pub async fn bind(addr: SocketAddr, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        Self::bind_with_timeout(addr, handler, REQUEST_READ_TIMEOUT).await
    }

    /// Like [`HttpServer::bind`], answering 408 to clients slower than `read_timeout`
    pub async fn bind_with_timeout(
        addr: SocketAddr,
        handler: Arc<dyn RequestHandler>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!("HTTP server listening on {}", local_addr);

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            let result =
                                handle_connection(stream, handler.as_ref(), read_timeout).await;
                            if let Err(e) = result {
                                error!("Error handling connection from {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        });

        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections
    pub fn shutdown(&self) {
        if !self.handle.is_finished() {
            info!("Shutting down HTTP server on {}", self.local_addr);
            self.handle.abort();
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    handler: &dyn RequestHandler,
    read_timeout: Duration,
) -> Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let request = match tokio::time::timeout(read_timeout, read_request(&mut reader)).await {
        Ok(request) => request?,
        Err(_) => {
            debug!("Timed out reading request");
            let response = HttpResponse::error(408, "Request Timeout");
            return send_response(&mut write_half, &response).await;
        }
    };

    let response = match request {
        Ok(request) if request.method == "POST" => handler.handle(request).await,
        Ok(_) => HttpResponse::error(405, "Method Not Allowed"),
        Err(rejection) => rejection,
    };

    send_response(&mut write_half, &response).await
}

/// Read a request, or the response rejecting it
async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<std::result::Result<HttpRequest, HttpResponse>> {
    let too_large = || HttpResponse::error(431, "Request Header Fields Too Large");
    let mut remaining = MAX_HEAD_SIZE;

    let Some(request_line) = read_head_line(reader, &mut remaining).await? else {
        return Ok(Err(too_large()));
    };

    debug!("Received request: {}", request_line.trim());

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Ok(Err(HttpResponse::error(400, "Bad Request")));
    }
    let method = parts[0].to_string();
    let path = parts[1].to_string();

    let mut content_length = 0;
    loop {
        let Some(header_line) = read_head_line(reader, &mut remaining).await? else {
            return Ok(Err(too_large()));
        };
        if header_line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header_line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    if content_length > MAX_BODY_SIZE {
        return Ok(Err(HttpResponse::error(413, "Payload Too Large")));
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(Ok(HttpRequest { method, path, body }))
}

/// Read one line of the request head within the `remaining` byte budget
///
/// Returns `None` once the head outgrows the budget. End of input yields an
/// empty line.
async fn read_head_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    remaining: &mut usize,
) -> Result<Option<String>> {
    let mut line = Vec::new();
    let limit = (*remaining as u64).saturating_add(1);
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;

    if read > *remaining {
        return Ok(None);
    }
    *remaining -= read;

    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

async fn send_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &HttpResponse,
) -> Result<()> {
    let raw = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        response.status,
        reason(response.status),
        response.body.len(),
        response.body
    );
    writer.write_all(raw.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

//! A scripted container engine listening on a Unix socket.
//!
//! Each connection serves one request and is then closed. Requests are routed
//! by a path fragment; anything unmatched gets a `404`. Every request target
//! is recorded.

use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8PathBuf;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// How the engine answers a matched request.
#[derive(Clone, Debug)]
pub enum Reply {
    /// A complete body with a fixed length.
    Fixed {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: Vec<u8>,
    },
    /// A chunked `200` body sent one chunk per unit.
    Stream {
        /// Chunks in send order.
        chunks: Vec<Vec<u8>>,
        /// Keep the response open after the last chunk.
        hold_open: bool,
    },
}

/// A path fragment and its reply.
#[derive(Clone, Debug)]
pub struct Route {
    /// Substring of the request path that selects this route.
    pub path_contains: String,
    /// The scripted answer.
    pub reply: Reply,
}

/// A running fake engine. Dropping it stops the server.
pub struct FakeEngine {
    _dir: TempDir,
    socket: Utf8PathBuf,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeEngine {
    /// Bind a socket in a fresh temporary directory and start serving.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(routes: Vec<Route>) -> Result<Self, &'static str> {
        let dir = tempfile::tempdir().map_err(|_| "failed to create tempdir")?;
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("engine.sock"))
            .map_err(|_| "tempdir path is not UTF-8")?;
        let listener = UnixListener::bind(&socket).map_err(|_| "failed to bind fake engine")?;
        let routes = Arc::new(routes);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&routes), Arc::clone(&log)));
            }
        });
        Ok(Self {
            _dir: dir,
            socket,
            requests,
            task,
        })
    }

    /// The `unix://` endpoint of this engine.
    pub fn endpoint(&self) -> String {
        format!("unix://{}", self.socket)
    }

    /// Request targets received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: UnixStream, routes: Arc<Vec<Route>>, log: Arc<Mutex<Vec<String>>>) {
    let Some(path) = read_request_path(&mut stream).await else {
        return;
    };
    log.lock().unwrap_or_else(PoisonError::into_inner).push(path.clone());
    let reply = routes
        .iter()
        .find(|route| path.contains(&route.path_contains))
        .map_or_else(
            || Reply::Fixed {
                status: 404,
                body: br#"{"message":"No such container"}"#.to_vec(),
            },
            |route| route.reply.clone(),
        );
    let _written = write_reply(&mut stream, reply).await;
}

/// Read the request head and return the request target.
async fn read_request_path(stream: &mut UnixStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buffer = [0_u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut buffer).await.ok()?;
        if read == 0 {
            return None;
        }
        head.extend_from_slice(buffer.get(..read)?);
    }
    let text = String::from_utf8_lossy(&head);
    text.split_whitespace().nth(1).map(String::from)
}

async fn write_reply(stream: &mut UnixStream, reply: Reply) -> std::io::Result<()> {
    match reply {
        Reply::Fixed { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reason(status),
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&body).await?;
        }
        Reply::Stream { chunks, hold_open } => {
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                )
                .await?;
            for chunk in chunks {
                stream
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .await?;
                stream.write_all(&chunk).await?;
                stream.write_all(b"\r\n").await?;
                stream.flush().await?;
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
            stream.write_all(b"0\r\n\r\n").await?;
        }
    }
    stream.shutdown().await
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// One newline-terminated event unit with `action` as status and action.
pub fn event_unit(action: &str) -> Vec<u8> {
    format!(
        r#"{{"status":"{action}","id":"c0ffee","from":"busybox","Type":"container","Action":"{action}","Actor":{{"ID":"c0ffee","Attributes":{{"name":"web"}}}},"time":1423339459,"timeNano":1423339459000000000}}"#
    )
    .into_bytes()
    .into_iter()
    .chain(std::iter::once(b'\n'))
    .collect()
}

/// A multiplexed log frame for `selector` carrying `payload`.
#[expect(
    clippy::big_endian_bytes,
    reason = "frame lengths are big-endian on the wire"
)]
pub fn log_frame(selector: u8, payload: &str) -> Vec<u8> {
    let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    let mut frame = vec![selector, 0, 0, 0];
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

//! Minimal HTTP/1.1 mirror for integration tests.
//!
//! Serves one static body for any path. Answers HEAD with Content-Length,
//! ETag and Last-Modified; GET with `Range: bytes=N-` with 206 when ranges
//! are enabled; POST with 200. Accepts absolute-form request targets, so the
//! same server doubles as an HTTP forward proxy. Every request is recorded.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MirrorServerOptions {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer every request with this status and an empty body.
    pub status_override: Option<u16>,
    /// Location header sent along with `status_override`.
    pub location: Option<String>,
    /// GET: announce the full length, send this many body bytes, then close.
    pub truncate_after: Option<usize>,
    /// GET: send this many body bytes, then go silent for `STALL`.
    pub stall_after: Option<usize>,
}

/// How long a stalling server stays silent before closing.
pub const STALL: Duration = Duration::from_secs(30);

impl Default for MirrorServerOptions {
    fn default() -> Self {
        Self {
            etag: None,
            last_modified: None,
            support_ranges: true,
            status_override: None,
            location: None,
            truncate_after: None,
            stall_after: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// e.g. `GET /repo/index-v2.json HTTP/1.1`
    pub request_line: String,
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MirrorServer {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MirrorServer {
    pub fn start(body: Vec<u8>) -> Self {
        Self::start_with_options(body, MirrorServerOptions::default())
    }

    /// Spawns the accept loop on a background thread; it runs until the process exits.
    pub fn start_with_options(body: Vec<u8>, opts: MirrorServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let body = Arc::new(body);
        let opts = Arc::new(opts);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let body = Arc::clone(&body);
                let opts = Arc::clone(&opts);
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, &body, &opts, &log));
            }
        });
        Self { port, requests }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL with a trailing slash, e.g. `http://127.0.0.1:12345/`.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.request_line)
            .collect()
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: &MirrorServerOptions,
    log: &Mutex<Vec<RecordedRequest>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let request = match read_request(&mut stream) {
        Some(r) => r,
        None => return,
    };
    log.lock().unwrap().push(request.clone());

    if let Some(code) = opts.status_override {
        let location = opts
            .location
            .as_deref()
            .map(|l| format!("Location: {}\r\n", l))
            .unwrap_or_default();
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\n{}Connection: close\r\n\r\n",
            code,
            reason(code),
            location
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let mut meta = String::new();
    if let Some(etag) = &opts.etag {
        meta.push_str(&format!("ETag: {}\r\n", etag));
    }
    if let Some(lm) = &opts.last_modified {
        meta.push_str(&format!("Last-Modified: {}\r\n", lm));
    }
    let total = body.len() as u64;

    match request.method.as_str() {
        "HEAD" => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                total, meta
            );
            let _ = stream.write_all(response.as_bytes());
        }
        "GET" => {
            let start = request
                .header("range")
                .and_then(parse_range_start)
                .filter(|_| opts.support_ranges);
            let (status, extra, slice) = match start {
                Some(s) if s >= total => (
                    "416 Range Not Satisfiable",
                    format!("Content-Range: bytes */{}\r\n", total),
                    &body[0..0],
                ),
                Some(s) => (
                    "206 Partial Content",
                    format!(
                        "Content-Range: bytes {}-{}/{}\r\n",
                        s,
                        total.saturating_sub(1),
                        total
                    ),
                    &body[s as usize..],
                ),
                None => ("200 OK", String::new(), body),
            };
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
                status,
                slice.len(),
                extra,
                meta
            );
            let _ = stream.write_all(response.as_bytes());
            match (opts.truncate_after, opts.stall_after) {
                (Some(n), _) => {
                    let _ = stream.write_all(&slice[..n.min(slice.len())]);
                }
                (None, Some(n)) => {
                    let _ = stream.write_all(&slice[..n.min(slice.len())]);
                    let _ = stream.flush();
                    thread::sleep(STALL);
                }
                (None, None) => {
                    let _ = stream.write_all(slice);
                }
            }
        }
        "POST" => {
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
            );
        }
        _ => {
            let _ = stream.write_all(
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    }
}

fn reason(code: u16) -> &'static str {
    match code {
        301 => "Moved Permanently",
        302 => "Found",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Reads the request head and, if Content-Length says so, the body.
fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut raw: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&raw, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
    };

    let head = std::str::from_utf8(&raw[..head_end]).ok()?.to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = raw[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    Some(RecordedRequest {
        request_line,
        method,
        target,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `bytes=N-` -> N. Closed ranges are not used by the client.
fn parse_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes=")?;
    let (start, _) = rest.split_once('-')?;
    start.trim().parse::<u64>().ok()
}

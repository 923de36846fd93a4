//! Stand-ins for the external build tool and source mirrors.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::builder::{BuildOutcome, PackageBuilder};
use crate::error::Result;

/// Builder that succeeds for a fixed set of packages and records every call.
#[derive(Debug, Default)]
pub struct FakeBuilder {
    succeeding: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeBuilder {
    pub fn succeeding(packages: &[&str]) -> Self {
        Self {
            succeeding: packages.iter().map(|p| p.to_string()).collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl PackageBuilder for FakeBuilder {
    fn build(&self, package: &str) -> Result<BuildOutcome> {
        self.calls.borrow_mut().push(package.to_string());
        let success = self.succeeding.contains(package);
        Ok(BuildOutcome {
            package: package.to_string(),
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            timed_out: false,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }
}

/// Minimal HTTP server answering every request with the same body.
///
/// The accept loop runs on a detached thread for the rest of the test process.
pub struct StaticHttpServer {
    addr: std::net::SocketAddr,
    body: Arc<Mutex<Vec<u8>>>,
    hits: Arc<AtomicUsize>,
}

impl StaticHttpServer {
    pub fn serve(body: &[u8]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("test server address");
        let body = Arc::new(Mutex::new(body.to_vec()));
        let hits = Arc::new(AtomicUsize::new(0));

        let (shared_body, shared_hits) = (Arc::clone(&body), Arc::clone(&hits));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                shared_hits.fetch_add(1, Ordering::SeqCst);
                let payload = shared_body.lock().map(|b| b.clone()).unwrap_or_default();
                respond(&mut stream, &payload);
            }
        });

        Self { addr, body, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn set_body(&self, body: &[u8]) {
        if let Ok(mut current) = self.body.lock() {
            *current = body.to_vec();
        }
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn respond(stream: &mut TcpStream, payload: &[u8]) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(payload);
    let _ = stream.flush();
}

//! In-process HTTP fixture used by the async tests. Serves canned responses from a
//! plain `TcpListener` so download, catalog and updater code can be exercised against
//! real sockets without any outside network.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

#[derive(Clone, Debug)]
pub enum Route {
    /// 200 with `Content-Length`.
    Body(Vec<u8>),
    /// 200 without `Content-Length`; the connection close ends the body.
    Unsized(Vec<u8>),
    /// Announces the full length but closes after `fraction` of the bytes.
    Truncated { body: Vec<u8>, fraction: f64 },
    /// Sends `chunk` bytes at a time with `delay` between writes.
    Slow {
        body: Vec<u8>,
        chunk: usize,
        delay: Duration,
    },
    Status(u16),
}

struct FixtureState {
    running: AtomicBool,
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
}

pub struct FixtureServer {
    port: u16,
    state: Arc<FixtureState>,
}

impl FixtureServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind fixture listener");
        listener
            .set_nonblocking(true)
            .expect("nonblocking fixture listener");
        let port = listener.local_addr().expect("fixture addr").port();
        let state = Arc::new(FixtureState {
            running: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            hits: Mutex::new(HashMap::new()),
        });
        let loop_state = Arc::clone(&state);
        thread::spawn(move || serve_loop(listener, loop_state));
        Self { port, state }
    }

    pub fn route(&self, path: &str, route: Route) -> &Self {
        self.state
            .routes
            .lock()
            .expect("routes lock")
            .insert(path.to_string(), route);
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .expect("hits lock")
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Relaxed);
    }
}

fn serve_loop(listener: TcpListener, state: Arc<FixtureState>) {
    while state.running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _)) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let _ = handle_connection(stream, &state);
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(_) => thread::sleep(Duration::from_millis(20)),
        }
    }
}

fn handle_connection(mut stream: TcpStream, state: &FixtureState) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(4)))?;

    let request_line = match read_request_line(&stream)? {
        Some(value) => value,
        None => return Ok(()),
    };
    let mut parts = request_line.split_whitespace();
    let _method = parts.next().unwrap_or("");
    let path = parts
        .next()
        .unwrap_or("/")
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    if let Ok(mut hits) = state.hits.lock() {
        *hits.entry(path.clone()).or_insert(0) += 1;
    }
    let route = state
        .routes
        .lock()
        .ok()
        .and_then(|routes| routes.get(&path).cloned());

    match route {
        None => write_status(&mut stream, 404),
        Some(Route::Status(code)) => write_status(&mut stream, code),
        Some(Route::Body(body)) => {
            write_headers(&mut stream, Some(body.len() as u64))?;
            stream.write_all(&body)?;
            stream.flush()
        }
        Some(Route::Unsized(body)) => {
            write_headers(&mut stream, None)?;
            stream.write_all(&body)?;
            stream.flush()
        }
        Some(Route::Truncated { body, fraction }) => {
            write_headers(&mut stream, Some(body.len() as u64))?;
            let cut = ((body.len() as f64) * fraction) as usize;
            stream.write_all(&body[..cut.min(body.len())])?;
            stream.flush()?;
            stream.shutdown(std::net::Shutdown::Both)
        }
        Some(Route::Slow { body, chunk, delay }) => {
            write_headers(&mut stream, Some(body.len() as u64))?;
            for piece in body.chunks(chunk.max(1)) {
                stream.write_all(piece)?;
                stream.flush()?;
                thread::sleep(delay);
            }
            Ok(())
        }
    }
}

fn read_request_line(stream: &TcpStream) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut first_line = String::new();
    if reader.read_line(&mut first_line)? == 0 {
        return Ok(None);
    }
    for _ in 0..64 {
        let mut line = String::new();
        let count = reader.read_line(&mut line)?;
        if count == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(Some(first_line))
}

fn write_status(stream: &mut TcpStream, code: u16) -> std::io::Result<()> {
    let body = format!("status {code}");
    let response = format!(
        "HTTP/1.1 {code} Fixture\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

fn write_headers(stream: &mut TcpStream, content_length: Option<u64>) -> std::io::Result<()> {
    let length = content_length
        .map(|value| format!("Content-Length: {value}\r\n"))
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n{length}Connection: close\r\n\r\n"
    );
    stream.write_all(response.as_bytes())
}

/// Builds a deflate zip in memory. Entry names ending in `/` become directories.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add zip dir");
        } else {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(data).expect("write zip entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tiwut-{}-{}", label, Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Client that ignores proxy variables from the environment so fixture traffic stays local.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build test client")
}

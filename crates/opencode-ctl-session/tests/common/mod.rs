//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use opencode_ctl_core::{ControllerConfig, Error, Result};
use opencode_ctl_server::{LaunchSpec, ServerLauncher, ServerProcess};

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config pointing at `127.0.0.1:port` with fast probing.
pub fn config_for_port(port: u16, working_dir: PathBuf) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.server.port = port;
    config.server.working_dir = working_dir;
    config.server.startup_timeout_secs = 5;
    config.server.probe_timeout_ms = 500;
    config.server.probe_interval_ms = 20;
    config.server.shutdown_grace_ms = 100;
    config
}

/// What a canned server does with API requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer every request with the canned body
    Respond,
    /// Close the listener and drop the connection on the first API request
    DieOnFirstRequest,
}

/// Minimal HTTP/1.1 server: healthy on `/global/health`, canned JSON elsewhere.
pub struct CannedServer {
    api_requests: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CannedServer {
    /// Start serving on `127.0.0.1:port`.
    pub fn start(port: u16, behavior: Behavior, body: &str) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        listener.set_nonblocking(true).unwrap();

        let api_requests = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let body = body.to_string();

        let handle = {
            let api_requests = Arc::clone(&api_requests);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let stream = match listener.accept() {
                        Ok((stream, _)) => stream,
                        Err(_) => {
                            std::thread::sleep(Duration::from_millis(5));
                            continue;
                        }
                    };
                    stream.set_nonblocking(false).unwrap();

                    let Some((request_line, stream)) = read_request(stream) else {
                        continue;
                    };
                    if request_line.contains(" /global/health") {
                        respond(stream, r#"{"healthy":true}"#);
                        continue;
                    }

                    api_requests.lock().unwrap().push(request_line);
                    if behavior == Behavior::DieOnFirstRequest {
                        drop(listener);
                        drop(stream);
                        return;
                    }
                    respond(stream, &body);
                }
            })
        };

        Self {
            api_requests,
            stop,
            handle: Some(handle),
        }
    }

    /// Request lines of every non-health request received.
    pub fn api_requests(&self) -> Vec<String> {
        self.api_requests.lock().unwrap().clone()
    }
}

impl Drop for CannedServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_request(stream: TcpStream) -> Option<(String, TcpStream)> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some((request_line.trim_end().to_string(), reader.into_inner()))
}

fn respond(mut stream: TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Process handle for a canned server; "terminating" it only flips a flag.
pub struct CannedProcess {
    alive: Arc<AtomicBool>,
}

impl ServerProcess for CannedProcess {
    fn pid(&self) -> u32 {
        31337
    }

    fn exit_status(&mut self) -> Result<Option<String>> {
        Ok((!self.alive.load(Ordering::SeqCst)).then(|| "terminated".to_string()))
    }

    fn terminate(&mut self, _grace: Duration) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher that "starts" a healthy canned server on the configured port.
#[derive(Clone)]
pub struct CannedLauncher {
    body: String,
    mode: LaunchMode,
    launches: Arc<AtomicUsize>,
    servers: Arc<Mutex<Vec<CannedServer>>>,
}

/// What a [`CannedLauncher`] does when asked to start a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Start a canned server with the given behavior
    Serve(Behavior),
    /// Report a process but never listen on the port
    NoServer,
    /// Fail to resolve the executable
    MissingExecutable,
}

impl CannedLauncher {
    /// Launcher whose servers answer API requests with `body`.
    pub fn new(body: &str) -> Self {
        Self::with_mode(body, LaunchMode::Serve(Behavior::Respond))
    }

    /// Launcher with an explicit launch mode.
    pub fn with_mode(body: &str, mode: LaunchMode) -> Self {
        Self {
            body: body.to_string(),
            mode,
            launches: Arc::new(AtomicUsize::new(0)),
            servers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of launches so far.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// API requests seen by the `index`th launched server.
    pub fn api_requests(&self, index: usize) -> Vec<String> {
        self.servers.lock().unwrap()[index].api_requests()
    }
}

impl ServerLauncher for CannedLauncher {
    fn resolve(&self, executable: &str) -> Result<PathBuf> {
        if self.mode == LaunchMode::MissingExecutable {
            return Err(Error::ExecutableNotFound(executable.to_string()));
        }
        Ok(PathBuf::from(executable))
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ServerProcess>> {
        let port = spec
            .args
            .windows(2)
            .find(|pair| pair[0] == "--port")
            .and_then(|pair| pair[1].parse().ok())
            .unwrap();

        self.launches.fetch_add(1, Ordering::SeqCst);
        if let LaunchMode::Serve(behavior) = self.mode {
            self.servers
                .lock()
                .unwrap()
                .push(CannedServer::start(port, behavior, &self.body));
        }
        Ok(Box::new(CannedProcess {
            alive: Arc::new(AtomicBool::new(true)),
        }))
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

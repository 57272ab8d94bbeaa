#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use devlauncher_core::ConnectorConfig;
use devlauncher_runtime::{Container, LaunchError, ProcessExit};

#[derive(Default)]
struct Inner {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_stop: bool,
    stop_delay: Duration,
    webapps: Mutex<Vec<(String, PathBuf)>>,
    stopped: Mutex<bool>,
    changed: Condvar,
}

/// Test double counting lifecycle calls. Clones share state.
#[derive(Clone, Default)]
pub struct CountingContainer {
    inner: Arc<Inner>,
}

impl CountingContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            inner: Arc::new(Inner {
                fail_stop: true,
                ..Inner::default()
            }),
        }
    }

    pub fn slow(stop_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                stop_delay,
                ..Inner::default()
            }),
        }
    }

    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    pub fn webapps(&self) -> Vec<(String, PathBuf)> {
        self.inner.webapps.lock().expect("webapps").clone()
    }

    /// Simulate the server going down on its own.
    pub fn terminate(&self) {
        *self.inner.stopped.lock().expect("stopped") = true;
        self.inner.changed.notify_all();
    }

    pub fn shared(&self) -> Arc<dyn Container> {
        Arc::new(self.clone())
    }
}

impl Container for CountingContainer {
    fn add_connector(&mut self, _connector: ConnectorConfig) {}

    fn add_webapp(&mut self, context_path: &str, directory: &Path, _context_file: Option<&Path>) {
        self.inner
            .webapps
            .lock()
            .expect("webapps")
            .push((context_path.to_string(), directory.to_path_buf()));
    }

    fn start(&self) -> Result<(), LaunchError> {
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), LaunchError> {
        thread::sleep(self.inner.stop_delay);
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_stop {
            return Err(LaunchError::Container("stop exploded".to_string()));
        }
        self.terminate();
        Ok(())
    }

    fn await_termination(&self) -> Result<(), LaunchError> {
        let mut stopped = self.inner.stopped.lock().expect("stopped");
        while !*stopped {
            stopped = self.inner.changed.wait(stopped).expect("wait");
        }
        Ok(())
    }
}

/// Records exit codes instead of exiting.
#[derive(Default)]
pub struct RecordingExit {
    codes: Mutex<Vec<i32>>,
}

impl RecordingExit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().expect("codes").clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().expect("codes").push(code);
    }
}

/// A loopback port nothing is listening on right now.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

/// Wait until something accepts connections on `port`.
pub fn wait_for_listener(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("nothing listening on port {port}");
}

pub fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("timed out waiting for {what}");
}

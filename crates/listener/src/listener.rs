// System-wide keyboard listener that runs on a background thread

use crate::backend::{diff_keys, CaptureBackend, KeyPoller};
use crate::key_log::KeyLog;
use keyclack_core::{
    CallbackId, CallbackRegistry, EventType, KeyCallback, KeyIdentity, KeyclackError, Result,
};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Listener construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Key log destination; `None` disables key logging entirely
    pub log_file: Option<PathBuf>,
    /// Deliver key releases as well as presses
    pub report_releases: bool,
    /// How often the capture thread samples keyboard state
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            report_releases: false,
            poll_interval: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Running,
}

/// Everything the capture thread needs to deliver an event
struct EventSink {
    callbacks: CallbackRegistry,
    key_log: Option<KeyLog>,
    report_releases: bool,
}

impl EventSink {
    fn deliver(&self, key: &KeyIdentity, event: EventType) {
        let verb = match event {
            EventType::Press => "pressed",
            EventType::Release if self.report_releases => "released",
            EventType::Release => return,
        };

        if let Some(key_log) = &self.key_log {
            key_log.record(format_args!("Key {}: {}", verb, key));
        }
        log::debug!("Key {}: {}", verb, key);

        self.callbacks.dispatch(key, event);
    }

    fn note(&self, message: &str) {
        if let Some(key_log) = &self.key_log {
            key_log.record(message);
        }
    }
}

struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Global keyboard listener.
///
/// `start` spawns one capture thread; every key event is delivered on that
/// thread to the registered callbacks in registration order.
pub struct KeyboardListener {
    backend: Arc<dyn CaptureBackend>,
    sink: Arc<EventSink>,
    poll_interval: Duration,
    capture: Option<CaptureThread>,
}

impl KeyboardListener {
    pub fn new(config: ListenerConfig, backend: Arc<dyn CaptureBackend>) -> Result<Self> {
        if config.poll_interval.is_zero() {
            return Err(KeyclackError::InvalidConfig(
                "Poll interval must be positive".to_string(),
            ));
        }

        let key_log = match &config.log_file {
            Some(path) => Some(KeyLog::open(path.clone())?),
            None => None,
        };

        Ok(Self {
            backend,
            sink: Arc::new(EventSink {
                callbacks: CallbackRegistry::new(),
                key_log,
                report_releases: config.report_releases,
            }),
            poll_interval: config.poll_interval,
            capture: None,
        })
    }

    /// Where key events are logged, if anywhere
    pub fn key_log_path(&self) -> Option<&Path> {
        self.sink.key_log.as_ref().map(KeyLog::path)
    }

    pub fn add_callback(&self, callback: Arc<dyn KeyCallback>) -> CallbackId {
        self.sink.callbacks.add_callback(callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.sink.callbacks.remove_callback(id)
    }

    /// `Idle` once the capture thread has exited, even before `stop`
    pub fn state(&self) -> ListenerState {
        match &self.capture {
            Some(capture) if !capture.handle.is_finished() => ListenerState::Running,
            _ => ListenerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Start capturing. A no-op while running.
    ///
    /// Returns `ListenerError` if the backend cannot be opened (missing
    /// display, denied permission); the listener then stays idle.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // Reap a capture thread that died on its own
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let backend = self.backend.clone();
        let sink = self.sink.clone();
        let thread_stop = stop.clone();
        let poll_interval = self.poll_interval;

        let handle = thread::Builder::new()
            .name("keyclack-capture".to_string())
            .spawn(move || {
                let mut poller = match backend.open() {
                    Ok(poller) => {
                        sink.note("Keyboard listener started");
                        let _ = ready_tx.send(Ok(()));
                        poller
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                capture_loop(poller.as_mut(), &sink, &thread_stop, poll_interval);
            })
            .map_err(|e| {
                KeyclackError::ListenerError(format!("Failed to spawn capture thread: {}", e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.capture = Some(CaptureThread { stop, handle });
                log::info!("Keyboard listener started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(match e {
                    KeyclackError::ListenerError(_) => e,
                    other => KeyclackError::ListenerError(other.to_string()),
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(KeyclackError::ListenerError(
                    "Capture thread exited before it was ready".to_string(),
                ))
            }
        }
    }

    /// Stop capturing and join the capture thread. A no-op while idle.
    pub fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };

        capture.stop.store(true, Ordering::Release);
        if capture.handle.join().is_err() {
            log::error!("Capture thread panicked");
        }

        log::info!("Keyboard listener stopped");
        self.sink.note("Keyboard listener stopped");
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll until `stop` is set. Keys already held when capture begins are not
/// reported.
fn capture_loop(
    poller: &mut dyn KeyPoller,
    sink: &EventSink,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    let Some(mut held) = poll(poller, sink) else {
        return;
    };

    while !stop.load(Ordering::Acquire) {
        let Some(current) = poll(poller, sink) else {
            return;
        };
        let (pressed, released) = diff_keys(&held, &current);

        for key in &released {
            sink.deliver(key, EventType::Release);
        }
        for key in &pressed {
            sink.deliver(key, EventType::Press);
        }

        held = current;
        thread::sleep(poll_interval);
    }
}

/// One snapshot; `None` if the poller panicked and capture must end
fn poll(poller: &mut dyn KeyPoller, sink: &EventSink) -> Option<Vec<KeyIdentity>> {
    match panic::catch_unwind(AssertUnwindSafe(|| poller.held_keys())) {
        Ok(keys) => Some(keys),
        Err(_) => {
            log::error!("Keyboard poller panicked; capture has stopped");
            sink.note("Keyboard listener failed");
            None
        }
    }
}

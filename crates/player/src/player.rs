// Sound player: cached loads, blocking playback, and fire-and-forget dispatch

use crate::cache::SoundCache;
use keyclack_core::{EventType, KeyCallback, KeyIdentity, PcmData, Result, SoundLoader};
use keyclack_renderer_api::OutputDevice;
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Player construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Maximum number of decoded sounds kept in memory
    pub cache_size: usize,
    /// Upper bound on concurrent `play_async` playbacks; `None` is unbounded
    pub max_concurrent_playbacks: Option<usize>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            cache_size: 1,
            max_concurrent_playbacks: None,
        }
    }
}

/// Count of in-flight async playbacks
struct PendingPlaybacks {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingPlaybacks {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    fn try_begin(&self, limit: Option<usize>) -> bool {
        let mut count = self.count.lock();
        if limit.is_some_and(|limit| *count >= limit) {
            return false;
        }
        *count += 1;
        true
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut count = self.count.lock();
        while *count > 0 {
            match deadline {
                Some(deadline) => {
                    if self.idle.wait_until(&mut count, deadline).timed_out() {
                        return *count == 0;
                    }
                }
                // Unrepresentable deadline: wait without one
                None => self.idle.wait(&mut count),
            }
        }
        true
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }
}

struct PlayerInner {
    cache: SoundCache,
    loader: Arc<dyn SoundLoader>,
    device: Arc<dyn OutputDevice>,
    pending: PendingPlaybacks,
    max_concurrent_playbacks: Option<usize>,
}

/// Released when an async playback ends, including by panic or failed spawn
struct PlaybackTicket {
    inner: Arc<PlayerInner>,
}

impl Drop for PlaybackTicket {
    fn drop(&mut self) {
        self.inner.pending.finish();
    }
}

/// Minimal-footprint sound player.
///
/// Cloning is cheap and every clone shares the same cache and device.
#[derive(Clone)]
pub struct SoundPlayer {
    inner: Arc<PlayerInner>,
}

impl SoundPlayer {
    pub fn new(
        config: PlayerConfig,
        loader: Arc<dyn SoundLoader>,
        device: Arc<dyn OutputDevice>,
    ) -> Result<Self> {
        let cache = SoundCache::new(config.cache_size)?;
        log::info!(
            "Sound player ready (cache size {}, concurrent playback limit {:?})",
            config.cache_size,
            config.max_concurrent_playbacks
        );

        Ok(Self {
            inner: Arc::new(PlayerInner {
                cache,
                loader,
                device,
                pending: PendingPlaybacks::new(),
                max_concurrent_playbacks: config.max_concurrent_playbacks,
            }),
        })
    }

    /// Make sure `path` is cached. Returns false if it could not be read as
    /// PCM wave data; the cache is left unchanged in that case.
    pub fn load(&self, path: impl AsRef<Path>) -> bool {
        self.fetch(path.as_ref()).is_some()
    }

    /// Play `path` to completion on the calling thread.
    /// Load and device failures are logged, never returned.
    pub fn play(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let Some(data) = self.fetch(path) else {
            return;
        };

        if let Err(e) = self.render(&data) {
            log::error!("Error playing {}: {}", path.display(), e);
        }
    }

    /// Play `path` on a new thread and return immediately
    pub fn play_async(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();

        if !self.inner.pending.try_begin(self.inner.max_concurrent_playbacks) {
            log::debug!(
                "Dropping playback of {}: concurrent playback limit reached",
                path.display()
            );
            return;
        }

        let ticket = PlaybackTicket {
            inner: self.inner.clone(),
        };
        let player = self.clone();
        let spawned = thread::Builder::new()
            .name("keyclack-play".to_string())
            .spawn(move || {
                let _ticket = ticket;
                player.play(&path);
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn playback thread: {}", e);
        }
    }

    /// Callback that plays `path` asynchronously on every key event
    pub fn callback_for(&self, path: impl Into<PathBuf>) -> Arc<dyn KeyCallback> {
        let player = self.clone();
        let path = path.into();
        Arc::new(move |_: &KeyIdentity, _: EventType| player.play_async(&path))
    }

    /// Block until no async playback is in flight or `timeout` elapses.
    /// Returns true if the player drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.pending.wait_idle(timeout)
    }

    /// Drop every cached sound and release the output device.
    /// Calling it again is a no-op.
    pub fn cleanup(&self) {
        self.inner.cache.clear();
        if let Err(e) = self.inner.device.release() {
            log::warn!("Failed to release audio device: {}", e);
        }
    }

    /// Cached paths from least to most recently used
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.inner.cache.keys()
    }

    pub fn is_cached(&self, path: impl AsRef<Path>) -> bool {
        self.inner.cache.contains(path.as_ref())
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cache.capacity()
    }

    pub fn pending_playbacks(&self) -> usize {
        self.inner.pending.get()
    }

    fn fetch(&self, path: &Path) -> Option<PcmData> {
        if let Some(data) = self.inner.cache.get(path) {
            return Some(data);
        }

        match self.inner.loader.load(path) {
            Ok(data) => {
                self.inner.cache.insert(path.to_path_buf(), data.clone());
                Some(data)
            }
            Err(e) => {
                log::warn!("Error loading sound {}: {}", path.display(), e);
                None
            }
        }
    }

    fn render(&self, data: &PcmData) -> Result<()> {
        let mut stream = self.inner.device.open_stream(data.spec())?;
        let written = stream.write(data.bytes());
        let closed = stream.close();
        written.and(closed)
    }
}

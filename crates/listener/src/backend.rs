// Keyboard capture backends

use device_query::{DeviceQuery, DeviceState};
use keyclack_core::{KeyIdentity, KeyclackError, Result};

/// Snapshot source opened on the capture thread
pub trait KeyPoller {
    /// Keys currently held down
    fn held_keys(&mut self) -> Vec<KeyIdentity>;
}

/// Capture backend trait
/// `open` runs on the capture thread, so pollers need not be `Send`
pub trait CaptureBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn KeyPoller>>;
}

/// System-wide keyboard state through `device_query`
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceQueryBackend;

impl DeviceQueryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for DeviceQueryBackend {
    fn open(&self) -> Result<Box<dyn KeyPoller>> {
        let state = DeviceState::checked_new().ok_or_else(|| {
            KeyclackError::ListenerError(
                "Cannot read global keyboard state; check display access or accessibility permissions"
                    .to_string(),
            )
        })?;
        Ok(Box::new(DeviceQueryPoller { state }))
    }
}

struct DeviceQueryPoller {
    state: DeviceState,
}

impl KeyPoller for DeviceQueryPoller {
    fn held_keys(&mut self) -> Vec<KeyIdentity> {
        self.state
            .get_keys()
            .iter()
            .map(|keycode| KeyIdentity::from_key_name(&format!("{:?}", keycode)))
            .collect()
    }
}

/// Split the change between two snapshots into (pressed, released) keys.
/// Pressed keys keep `current` order, released keys keep `previous` order.
pub(crate) fn diff_keys(
    previous: &[KeyIdentity],
    current: &[KeyIdentity],
) -> (Vec<KeyIdentity>, Vec<KeyIdentity>) {
    let pressed = current
        .iter()
        .filter(|key| !previous.contains(key))
        .cloned()
        .collect();
    let released = previous
        .iter()
        .filter(|key| !current.contains(key))
        .cloned()
        .collect();
    (pressed, released)
}

//! Local capture devices
//!
//! One instance per process (see [`SharedStore`](crate::registry::SharedStore)).

use crate::error::Result;
use crate::state::{ObservableState, StateConfig};

use super::Store;

/// Capture device status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceStatus {
    #[default]
    Off,
    On,
}

impl DeviceStatus {
    /// Returns true if the device is capturing
    pub fn is_on(&self) -> bool {
        matches!(self, DeviceStatus::On)
    }
}

/// Audio output route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioRoute {
    #[default]
    Speakerphone,
    Earpiece,
}

/// Device state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub microphone: DeviceStatus,
    pub camera: DeviceStatus,
    /// Front lens selected; kept while the camera is off
    pub is_front_camera: bool,
    pub audio_route: AudioRoute,
}

/// Facade over the device state
#[derive(Debug)]
pub struct DeviceStore {
    state: ObservableState<DeviceState>,
}

impl DeviceStore {
    /// Create a store with every device off
    pub fn new() -> Self {
        Self::with_config(StateConfig::labeled("device"))
    }

    /// Create a store with a custom container configuration
    pub fn with_config(config: StateConfig) -> Self {
        let initial = DeviceState {
            is_front_camera: true,
            ..Default::default()
        };
        Self {
            state: ObservableState::with_config(initial, config),
        }
    }

    /// Start capturing audio
    pub fn open_microphone(&self) -> Result<()> {
        self.state.update(|s| s.microphone = DeviceStatus::On)
    }

    /// Stop capturing audio
    pub fn close_microphone(&self) -> Result<()> {
        self.state.update(|s| s.microphone = DeviceStatus::Off)
    }

    /// Turn the camera on, choosing the front or rear lens
    pub fn open_camera(&self, front: bool) -> Result<()> {
        self.state.update(|s| {
            s.camera = DeviceStatus::On;
            s.is_front_camera = front;
        })
    }

    /// Turn the camera off; the lens choice is kept
    pub fn close_camera(&self) -> Result<()> {
        self.state.update(|s| s.camera = DeviceStatus::Off)
    }

    /// Switch audio output between speaker and earpiece
    pub fn set_audio_route(&self, route: AudioRoute) -> Result<()> {
        self.state.update(|s| s.audio_route = route)
    }

    /// Close every device and restore the default route
    pub fn reset(&self) -> Result<()> {
        self.state.update(|s| {
            *s = DeviceState {
                is_front_camera: true,
                ..Default::default()
            }
        })
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for DeviceStore {
    type State = DeviceState;

    fn state(&self) -> &ObservableState<DeviceState> {
        &self.state
    }

    fn on_retire(&self) {
        if let Err(e) = self.reset() {
            tracing::warn!(error = %e, "Device reset failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::selector::Selector;

    #[test]
    fn test_initial_state() {
        let store = DeviceStore::new();
        let state = store.value();

        assert!(!state.microphone.is_on());
        assert!(!state.camera.is_on());
        assert!(state.is_front_camera);
        assert_eq!(state.audio_route, AudioRoute::Speakerphone);
        assert_eq!(store.state().label(), "device");
    }

    #[test]
    fn test_microphone_subscriber_ignores_camera() {
        let store = DeviceStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);

        let _sub = store.subscribe(
            Selector::path(|s: &DeviceState| &s.microphone),
            move |status| sink.lock().unwrap().push(status),
        );

        store.open_camera(false).unwrap();
        store.set_audio_route(AudioRoute::Earpiece).unwrap();
        store.open_microphone().unwrap();
        store.open_microphone().unwrap();
        store.close_microphone().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![DeviceStatus::Off, DeviceStatus::On, DeviceStatus::Off]
        );
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = DeviceStore::new();
        store.open_camera(false).unwrap();
        store.open_microphone().unwrap();
        store.set_audio_route(AudioRoute::Earpiece).unwrap();

        store.on_retire();

        let state = store.value();
        assert!(!state.camera.is_on());
        assert!(!state.microphone.is_on());
        assert!(state.is_front_camera);
        assert_eq!(state.audio_route, AudioRoute::Speakerphone);
    }
}

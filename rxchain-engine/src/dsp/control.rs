//! Handles for changing stage parameters while a run is active.
//!
//! A stage owns the receiving side and checks it at the start of each block,
//! so a block is processed entirely with the old or entirely with the new
//! value.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Pending update slot, taken by the stage at the next block boundary.
#[derive(Debug)]
pub struct Setting<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Setting<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a new value, replacing any value not yet picked up.
    pub fn set(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Setting<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

/// Shared `f32` value.
#[derive(Debug, Clone)]
pub struct Level(Arc<AtomicU32>);

impl Level {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Shared on/off flag.
#[derive(Debug, Clone)]
pub struct Switch(Arc<AtomicBool>);

impl Switch {
    pub fn new(on: bool) -> Self {
        Self(Arc::new(AtomicBool::new(on)))
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Controls an AGC stage: automatic, or held at a fixed gain.
#[derive(Debug, Clone)]
pub struct AgcControl {
    // 0.0 selects automatic mode
    fixed: Level,
    current: Level,
}

impl AgcControl {
    pub(crate) fn new() -> Self {
        Self {
            fixed: Level::new(0.0),
            current: Level::new(1.0),
        }
    }

    pub fn set_auto(&self) {
        self.fixed.set(0.0);
    }

    /// Hold the gain at `gain`. Non-positive values select automatic mode.
    pub fn set_fixed(&self, gain: f32) {
        self.fixed.set(gain.max(0.0));
    }

    pub fn is_auto(&self) -> bool {
        self.fixed.get() == 0.0
    }

    /// Fixed gain, if one is set.
    pub fn fixed(&self) -> Option<f32> {
        let gain = self.fixed.get();
        (gain > 0.0).then_some(gain)
    }

    /// Gain most recently applied by the stage.
    pub fn current(&self) -> f32 {
        self.current.get()
    }

    pub(crate) fn publish(&self, gain: f32) {
        self.current.set(gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_is_taken_once() {
        let setting = Setting::new();
        let handle = setting.clone();
        handle.set(5);
        handle.set(7);
        assert_eq!(setting.take(), Some(7));
        assert_eq!(setting.take(), None);
    }

    #[test]
    fn test_agc_control_modes() {
        let control = AgcControl::new();
        assert!(control.is_auto());
        assert_eq!(control.fixed(), None);

        control.set_fixed(0.25);
        assert!(!control.is_auto());
        assert_eq!(control.fixed(), Some(0.25));

        control.set_auto();
        assert!(control.is_auto());
        assert_eq!(control.current(), 1.0);
    }
}

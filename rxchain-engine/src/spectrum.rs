use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Latest magnitude spectrum published by an FFT tap.
///
/// Frames are published whole and read back as a copy together with their
/// generation, so a reader never sees half of one frame and half of the
/// next. Generation 0 is the zero-filled frame from construction.
#[derive(Debug, Clone)]
pub struct SpectrumSnapshot {
    frame: Arc<Mutex<Vec<f32>>>,
    generation: Arc<AtomicU64>,
}

impl SpectrumSnapshot {
    pub fn new(len: usize) -> Self {
        Self {
            frame: Arc::new(Mutex::new(vec![0.0; len])),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Copy of the current frame and its generation.
    pub fn read(&self) -> (Vec<f32>, u64) {
        let frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        (frame.clone(), self.generation.load(Ordering::Acquire))
    }

    /// Replace the frame. Extra values are ignored, missing ones are zeroed.
    pub(crate) fn publish(&self, magnitudes: &[f32]) {
        let mut frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        let n = frame.len().min(magnitudes.len());
        frame[..n].copy_from_slice(&magnitudes[..n]);
        frame[n..].fill(0.0);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zero_filled() {
        let snapshot = SpectrumSnapshot::new(8);
        assert_eq!(snapshot.read(), (vec![0.0; 8], 0));
    }

    #[test]
    fn test_publish_bumps_generation() {
        let snapshot = SpectrumSnapshot::new(4);
        let reader = snapshot.clone();
        snapshot.publish(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        snapshot.publish(&[6.0, 7.0]);
        assert_eq!(reader.read(), (vec![6.0, 7.0, 0.0, 0.0], 2));
    }
}

use super::{Flow, Stage};
use crate::Result;
use crate::spectrum::SpectrumSnapshot;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Periodic spectrum tap.
///
/// The transform size counts block values: a frame holds `size / 2` complex
/// pairs, or `size / 2` real values. Complex frames publish all `size / 2`
/// bins with DC in the middle; real frames publish the `size / 4` positive
/// bins. Magnitudes are averaged over `averaging` frames, then `skip` frames
/// are discarded before the next capture.
pub struct FftTap {
    fft: Arc<dyn Fft<f32>>,
    complex: bool,
    frame: usize,
    averaging: usize,
    skip: usize,
    pending: Vec<Complex<f32>>,
    sum: Vec<f32>,
    collected: usize,
    skipping: usize,
    snapshot: SpectrumSnapshot,
}

impl FftTap {
    pub fn new(size: usize, complex: bool, averaging: usize, skip: usize) -> (Self, SpectrumSnapshot) {
        let frame = (size / 2).max(2);
        let bins = if complex { frame } else { frame / 2 };
        let snapshot = SpectrumSnapshot::new(bins);
        let fft = FftPlanner::new().plan_fft_forward(frame);
        (
            Self {
                fft,
                complex,
                frame,
                averaging: averaging.max(1),
                skip,
                pending: Vec::with_capacity(frame),
                sum: vec![0.0; bins],
                collected: 0,
                skipping: 0,
                snapshot: snapshot.clone(),
            },
            snapshot,
        )
    }

    fn push(&mut self, sample: Complex<f32>) {
        self.pending.push(sample);
        if self.pending.len() < self.frame {
            return;
        }
        if self.skipping > 0 {
            self.skipping -= 1;
            self.pending.clear();
            return;
        }
        self.transform();
    }

    fn transform(&mut self) {
        let mut buffer = std::mem::take(&mut self.pending);
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.frame as f32;
        if self.complex {
            // Negative frequencies first, DC in the middle
            buffer.rotate_left(self.frame / 2);
        }
        for (sum, bin) in self.sum.iter_mut().zip(buffer.iter()) {
            *sum += bin.norm() * scale;
        }
        buffer.clear();
        self.pending = buffer;

        self.collected += 1;
        if self.collected == self.averaging {
            let count = self.averaging as f32;
            let average: Vec<f32> = self.sum.iter().map(|v| v / count).collect();
            self.snapshot.publish(&average);
            self.sum.fill(0.0);
            self.collected = 0;
            self.skipping = self.skip;
        }
    }
}

impl Stage for FftTap {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if self.complex {
            for pair in block.chunks_exact(2) {
                self.push(Complex::new(pair[0], pair[1]));
            }
        } else {
            for v in block.iter() {
                self.push(Complex::new(*v, 0.0));
            }
        }
        Ok(Flow::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn peak_bin(frame: &[f32]) -> usize {
        frame
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_real_tone_lands_in_expected_bin() {
        let (mut tap, snapshot) = FftTap::new(1024, false, 1, 0);
        assert_eq!(snapshot.len(), 256);

        // 512 point transform at 48 kHz: 93.75 Hz per bin
        let mut block: Vec<f32> = (0..1024)
            .map(|n| 1000.0 * (2.0 * PI * 9375.0 * n as f32 / 48_000.0).sin())
            .collect();
        tap.process(&mut block).unwrap();

        let (frame, generation) = snapshot.read();
        assert_eq!(generation, 2);
        assert_eq!(peak_bin(&frame), 100);
    }

    #[test]
    fn test_complex_tone_is_centered() {
        let (mut tap, snapshot) = FftTap::new(1024, true, 2, 0);
        assert_eq!(snapshot.len(), 512);

        // 48 kHz, 512 bins: 93.75 Hz per bin, DC at bin 256
        let mut block: Vec<f32> = (0..1024)
            .flat_map(|n| {
                let phase = 2.0 * PI * -1875.0 * n as f32 / 48_000.0;
                [phase.cos() * 1000.0, phase.sin() * 1000.0]
            })
            .collect();
        tap.process(&mut block).unwrap();

        let (frame, generation) = snapshot.read();
        assert_eq!(generation, 1);
        assert_eq!(peak_bin(&frame), 256 - 20);
    }

    #[test]
    fn test_skip_discards_frames() {
        let (mut tap, snapshot) = FftTap::new(8, false, 1, 2);
        let mut block = vec![1.0; 4 * 4];
        tap.process(&mut block).unwrap();
        // Frames 1 and 4 are captured, 2 and 3 skipped
        assert_eq!(snapshot.generation(), 2);
    }
}

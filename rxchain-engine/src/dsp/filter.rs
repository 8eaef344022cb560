//! FIR and biquad filter stages.

use super::design::BiquadCoeffs;
use super::{Flow, Setting, Stage};
use crate::Result;

/// Coefficient slot of a FIR stage.
pub type Taps = Setting<Vec<f32>>;

/// FIR state for a single real channel.
#[derive(Debug, Clone)]
pub(crate) struct FirState {
    taps: Vec<f32>,
    history: Vec<f32>,
}

impl FirState {
    pub(crate) fn new(taps: Vec<f32>) -> Self {
        let history = vec![0.0; taps.len().saturating_sub(1)];
        Self { taps, history }
    }

    pub(crate) fn set_taps(&mut self, taps: Vec<f32>) {
        self.history.resize(taps.len().saturating_sub(1), 0.0);
        self.taps = taps;
    }

    /// Filter `samples` in place.
    pub(crate) fn filter(&mut self, samples: &mut [f32]) {
        if self.taps.is_empty() {
            return;
        }
        let keep = self.history.len();
        let mut work = Vec::with_capacity(keep + samples.len());
        work.extend_from_slice(&self.history);
        work.extend_from_slice(samples);

        for (n, out) in samples.iter_mut().enumerate() {
            let newest = n + keep;
            *out = self
                .taps
                .iter()
                .enumerate()
                .map(|(k, h)| h * work[newest - k])
                .sum();
        }

        let tail = work.len() - keep;
        self.history.copy_from_slice(&work[tail..]);
    }
}

/// Real valued FIR filter.
pub struct Fir {
    state: FirState,
    taps: Taps,
}

impl Fir {
    pub fn new(taps: Vec<f32>) -> (Self, Taps) {
        let control = Taps::new();
        (
            Self {
                state: FirState::new(taps),
                taps: control.clone(),
            },
            control,
        )
    }
}

impl Stage for Fir {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(taps) = self.taps.take() {
            self.state.set_taps(taps);
        }
        self.state.filter(block);
        Ok(Flow::Forward)
    }
}

/// Split interleaved I/Q values into two channels.
pub(crate) fn deinterleave(block: &[f32]) -> (Vec<f32>, Vec<f32>) {
    block
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .unzip()
}

pub(crate) fn interleave(i: &[f32], q: &[f32], block: &mut [f32]) {
    for (pair, (i, q)) in block.chunks_exact_mut(2).zip(i.iter().zip(q)) {
        pair[0] = *i;
        pair[1] = *q;
    }
}

/// FIR filter on interleaved I/Q samples, real taps applied to both channels.
pub struct IqFir {
    i: FirState,
    q: FirState,
    taps: Taps,
}

impl IqFir {
    pub fn new(taps: Vec<f32>) -> (Self, Taps) {
        let control = Taps::new();
        (
            Self {
                i: FirState::new(taps.clone()),
                q: FirState::new(taps),
                taps: control.clone(),
            },
            control,
        )
    }
}

impl Stage for IqFir {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(taps) = self.taps.take() {
            self.i.set_taps(taps.clone());
            self.q.set_taps(taps);
        }
        let (mut i, mut q) = deinterleave(block);
        self.i.filter(&mut i);
        self.q.filter(&mut q);
        interleave(&i, &q, block);
        Ok(Flow::Forward)
    }
}

/// One biquad section, direct form II transposed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Section {
    coeffs: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl Section {
    pub(crate) fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub(crate) fn run(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Cascade of biquad sections. A single section is a plain biquad.
pub struct Biquads {
    sections: Vec<Section>,
    coeffs: Setting<Vec<BiquadCoeffs>>,
}

impl Biquads {
    pub fn new(coeffs: Vec<BiquadCoeffs>) -> (Self, Setting<Vec<BiquadCoeffs>>) {
        let control = Setting::new();
        (
            Self {
                sections: coeffs.into_iter().map(Section::new).collect(),
                coeffs: control.clone(),
            },
            control,
        )
    }

    pub fn single(coeffs: BiquadCoeffs) -> (Self, Setting<Vec<BiquadCoeffs>>) {
        Self::new(vec![coeffs])
    }

    pub(crate) fn apply(&mut self, coeffs: Vec<BiquadCoeffs>) {
        // Keep the delay line of surviving sections
        self.sections.resize_with(coeffs.len(), Section::default);
        for (section, c) in self.sections.iter_mut().zip(coeffs) {
            section.coeffs = c;
        }
    }

    pub(crate) fn filter(&mut self, block: &mut [f32]) {
        for v in block.iter_mut() {
            *v = self.sections.iter_mut().fold(*v, |x, s| s.run(x));
        }
    }
}

impl Stage for Biquads {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(coeffs) = self.coeffs.take() {
            self.apply(coeffs);
        }
        self.filter(block);
        Ok(Flow::Forward)
    }
}

/// Removes mains hum: a notch on every harmonic of the fundamental up to
/// `cutoff`, and a high-pass at the fundamental.
///
/// A fundamental of 0 turns the filter off.
pub struct HumFilter {
    rate: u32,
    cutoff: u32,
    biquads: Biquads,
    fundamental: Setting<u32>,
}

impl HumFilter {
    pub fn new(rate: u32, fundamental: u32, cutoff: u32) -> (Self, Setting<u32>) {
        let control = Setting::new();
        let (biquads, _) = Biquads::new(Self::design(rate, fundamental, cutoff));
        (
            Self {
                rate,
                cutoff,
                biquads,
                fundamental: control.clone(),
            },
            control,
        )
    }

    fn design(rate: u32, fundamental: u32, cutoff: u32) -> Vec<BiquadCoeffs> {
        if fundamental == 0 {
            return Vec::new();
        }
        let fs = rate as f32;
        let mut sections: Vec<BiquadCoeffs> = (1..)
            .map(|k| k * fundamental)
            .take_while(|f| *f <= cutoff && (*f as f32) < fs / 2.0)
            .map(|f| BiquadCoeffs::notch(f as f32, fs, 10.0))
            .collect();
        sections.push(BiquadCoeffs::highpass(fundamental as f32, fs, 0.7071));
        sections
    }
}

impl Stage for HumFilter {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(fundamental) = self.fundamental.take() {
            self.biquads
                .apply(Self::design(self.rate, fundamental, self.cutoff));
        }
        self.biquads.filter(block);
        Ok(Flow::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::design;

    fn tone(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| 1000.0 * (2.0 * std::f32::consts::PI * freq * n as f32 / rate).sin())
            .collect()
    }

    fn rms(block: &[f32]) -> f32 {
        (block.iter().map(|v| v * v).sum::<f32>() / block.len() as f32).sqrt()
    }

    #[test]
    fn test_fir_keeps_state_across_blocks() {
        let (mut whole, _) = Fir::new(vec![0.5, 0.25, 0.25]);
        let (mut split, _) = Fir::new(vec![0.5, 0.25, 0.25]);

        let input: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let mut a = input.clone();
        whole.process(&mut a).unwrap();

        let mut b = input.clone();
        let (first, second) = b.split_at_mut(5);
        split.process(first).unwrap();
        split.process(second).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_fir_taps_apply_at_next_block() {
        let (mut fir, taps) = Fir::new(vec![1.0]);
        let mut block = vec![2.0; 4];
        taps.set(vec![0.5]);
        fir.process(&mut block).unwrap();
        assert_eq!(block, vec![1.0; 4]);
    }

    #[test]
    fn test_iq_fir_filters_channels_independently() {
        let (mut fir, _) = IqFir::new(vec![0.5, 0.5]);
        let mut block = vec![2.0, 4.0, 2.0, 4.0, 2.0, 4.0];
        fir.process(&mut block).unwrap();
        assert_eq!(block, vec![1.0, 2.0, 2.0, 4.0, 2.0, 4.0]);
    }

    #[test]
    fn test_biquad_low_pass_attenuates() {
        let (mut lp, _) = Biquads::single(design::BiquadCoeffs::lowpass(1000.0, 48000.0, 0.7071));
        let mut block = tone(10_000.0, 48_000.0, 4096);
        lp.process(&mut block).unwrap();
        assert!(rms(&block[2048..]) < 20.0);
    }

    #[test]
    fn test_hum_filter_removes_mains() {
        let (mut hum, fundamental) = HumFilter::new(48_000, 50, 600);
        let mut block = tone(150.0, 48_000.0, 48_000);
        hum.process(&mut block).unwrap();
        assert!(rms(&block[24_000..]) < 20.0);

        fundamental.set(0);
        let mut block = tone(150.0, 48_000.0, 4096);
        let original = block.clone();
        hum.process(&mut block).unwrap();
        assert_eq!(block, original);
    }
}

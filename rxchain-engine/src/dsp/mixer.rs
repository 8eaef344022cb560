//! Frequency translation.

use super::{Flow, Setting, Stage};
use crate::Result;
use num_complex::Complex;
use std::f64::consts::TAU;

/// Phase accumulator of a local oscillator.
#[derive(Debug, Clone)]
pub(crate) struct Oscillator {
    rate: f64,
    step: f64,
    phase: f64,
}

impl Oscillator {
    pub(crate) fn new(rate: u32, frequency: f64) -> Self {
        let mut osc = Self {
            rate: rate as f64,
            step: 0.0,
            phase: 0.0,
        };
        osc.set_frequency(frequency);
        osc
    }

    pub(crate) fn set_frequency(&mut self, frequency: f64) {
        self.step = TAU * frequency / self.rate;
    }

    #[cfg(test)]
    pub(crate) fn frequency(&self) -> f64 {
        self.step * self.rate / TAU
    }

    #[inline]
    fn advance(&mut self) -> f64 {
        let phase = self.phase;
        self.phase = (self.phase + self.step) % TAU;
        phase
    }

    #[inline]
    pub(crate) fn next_cos(&mut self) -> f32 {
        self.advance().cos() as f32
    }

    #[inline]
    pub(crate) fn next_phasor(&mut self) -> Complex<f32> {
        let phase = self.advance();
        Complex::new(phase.cos() as f32, phase.sin() as f32)
    }
}

/// Real mixer, multiplying the signal with a local oscillator.
pub struct Multiplier {
    osc: Oscillator,
    frequency: Setting<f64>,
}

impl Multiplier {
    pub fn new(rate: u32, frequency: f64) -> (Self, Setting<f64>) {
        let control = Setting::new();
        (
            Self {
                osc: Oscillator::new(rate, frequency),
                frequency: control.clone(),
            },
            control,
        )
    }

    pub(crate) fn oscillator(&mut self) -> &mut Oscillator {
        &mut self.osc
    }

    pub(crate) fn mix(&mut self, block: &mut [f32]) {
        for v in block.iter_mut() {
            *v *= self.osc.next_cos();
        }
    }
}

impl Stage for Multiplier {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(frequency) = self.frequency.take() {
            self.osc.set_frequency(frequency);
        }
        self.mix(block);
        Ok(Flow::Forward)
    }
}

/// Complex frequency shift of interleaved I/Q samples.
pub struct IqMultiplier {
    osc: Oscillator,
    frequency: Setting<f64>,
}

impl IqMultiplier {
    pub fn new(rate: u32, frequency: f64) -> (Self, Setting<f64>) {
        let control = Setting::new();
        (
            Self {
                osc: Oscillator::new(rate, frequency),
                frequency: control.clone(),
            },
            control,
        )
    }
}

impl Stage for IqMultiplier {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(frequency) = self.frequency.take() {
            self.osc.set_frequency(frequency);
        }
        for pair in block.chunks_exact_mut(2) {
            let shifted = Complex::new(pair[0], pair[1]) * self.osc.next_phasor();
            pair[0] = shifted.re;
            pair[1] = shifted.im;
        }
        Ok(Flow::Forward)
    }
}

//! Coefficient design.

use rustradio::window::WindowType;
use std::f32::consts::PI;
use std::f64::consts::TAU;

fn transition_width(rate: f32, taps: usize) -> f32 {
    // Hamming: taps ~= 3.3 * rate / transition width
    3.3 * rate / taps.max(3) as f32
}

fn clamp_cutoff(rate: f32, cutoff: f32) -> f32 {
    cutoff.clamp(1.0, rate * 0.49)
}

/// Windowed-sinc low-pass with roughly `taps` coefficients.
pub fn low_pass(rate: u32, cutoff: f32, taps: usize) -> Vec<f32> {
    let rate = rate as f32;
    rustradio::fir::low_pass(
        rate,
        clamp_cutoff(rate, cutoff),
        transition_width(rate, taps),
        &WindowType::Hamming,
    )
}

/// Band-pass between `low` and `high`, made by shifting a low-pass prototype
/// up to the band center.
pub fn band_pass(rate: u32, low: f32, high: f32, taps: usize) -> Vec<f32> {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    let center = (low + high) / 2.0;
    let prototype = low_pass(rate, ((high - low) / 2.0).max(1.0), taps);
    let middle = (prototype.len() as f32 - 1.0) / 2.0;
    prototype
        .iter()
        .enumerate()
        .map(|(n, h)| h * 2.0 * (2.0 * PI * center * (n as f32 - middle) / rate as f32).cos())
        .collect()
}

/// Biquad coefficients, normalized so that a0 == 1.
///
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub const UNITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn prewarp(fc: f32, fs: f32, q: f32) -> (f32, f32) {
        let omega = TAU * fc as f64 / fs as f64;
        (omega.cos() as f32, (omega.sin() / (2.0 * q as f64)) as f32)
    }

    fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    pub fn lowpass(fc: f32, fs: f32, q: f32) -> Self {
        let (cos, alpha) = Self::prewarp(fc, fs, q);
        Self::normalize(
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    pub fn highpass(fc: f32, fs: f32, q: f32) -> Self {
        let (cos, alpha) = Self::prewarp(fc, fs, q);
        Self::normalize(
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Constant 0 dB peak gain band-pass.
    pub fn bandpass(fc: f32, fs: f32, q: f32) -> Self {
        let (cos, alpha) = Self::prewarp(fc, fs, q);
        Self::normalize(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
    }

    pub fn notch(fc: f32, fs: f32, q: f32) -> Self {
        let (cos, alpha) = Self::prewarp(fc, fs, q);
        Self::normalize(1.0, -2.0 * cos, 1.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
    }

    /// Magnitude response at `f`, evaluated in double precision.
    pub fn magnitude(&self, f: f32, fs: f32) -> f32 {
        let w = TAU * f as f64 / fs as f64;
        let z1 = num_complex::Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = z1 * self.b1 as f64 + z2 * self.b2 as f64 + self.b0 as f64;
        let den = z1 * self.a1 as f64 + z2 * self.a2 as f64 + 1.0;
        (num.norm() / den.norm()) as f32
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::UNITY
    }
}

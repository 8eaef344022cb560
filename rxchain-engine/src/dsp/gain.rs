use super::{AgcControl, Flow, Level, Stage};
use crate::Result;

/// Fixed gain, adjustable through its [`Level`].
pub struct Gain {
    level: Level,
}

impl Gain {
    pub fn new(gain: f32) -> (Self, Level) {
        let level = Level::new(gain);
        (
            Self {
                level: level.clone(),
            },
            level,
        )
    }
}

impl Stage for Gain {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        let gain = self.level.get();
        if gain != 1.0 {
            for v in block.iter_mut() {
                *v *= gain;
            }
        }
        Ok(Flow::Forward)
    }
}

const AGC_ATTACK: f32 = 0.01;
const AGC_DECAY: f32 = 0.0002;
const AGC_MAX_GAIN: f32 = 1000.0;
const AGC_MIN_GAIN: f32 = 0.001;

/// Automatic gain control holding the signal envelope near a target level.
///
/// Fast attack, slow decay. When its [`AgcControl`] holds a fixed gain the
/// envelope tracking is suspended and the fixed gain is applied instead.
pub struct Agc {
    target: f32,
    envelope: f32,
    gain: f32,
    control: AgcControl,
}

impl Agc {
    pub fn new(target: f32) -> (Self, AgcControl) {
        let control = AgcControl::new();
        (Self::with_control(target, control.clone()), control)
    }

    /// AGC driven by an existing control handle.
    pub fn with_control(target: f32, control: AgcControl) -> Self {
        Self {
            target,
            envelope: 0.0,
            gain: 1.0,
            control,
        }
    }

    fn track(&mut self, x: f32) -> f32 {
        let level = x.abs();
        let coeff = if level > self.envelope {
            AGC_ATTACK
        } else {
            AGC_DECAY
        };
        self.envelope += coeff * (level - self.envelope);

        let desired = if self.envelope > 1e-3 {
            (self.target / self.envelope).clamp(AGC_MIN_GAIN, AGC_MAX_GAIN)
        } else {
            AGC_MAX_GAIN
        };
        let coeff = if desired < self.gain {
            AGC_ATTACK
        } else {
            AGC_DECAY
        };
        self.gain += coeff * (desired - self.gain);
        x * self.gain
    }
}

impl Stage for Agc {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        match self.control.fixed() {
            Some(gain) => {
                for v in block.iter_mut() {
                    *v *= gain;
                }
                self.gain = gain;
            }
            None => {
                for v in block.iter_mut() {
                    *v = self.track(*v);
                }
            }
        }
        self.control.publish(self.gain);
        Ok(Flow::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_level_changes_between_blocks() {
        let (mut gain, level) = Gain::new(2.0);
        let mut block = vec![1.0; 4];
        gain.process(&mut block).unwrap();
        assert_eq!(block, vec![2.0; 4]);

        level.set(0.5);
        gain.process(&mut block).unwrap();
        assert_eq!(block, vec![1.0; 4]);
    }

    #[test]
    fn test_agc_converges_to_target() {
        let (mut agc, control) = Agc::new(500.0);
        let mut last = Vec::new();
        for _ in 0..200 {
            let mut block: Vec<f32> = (0..1024)
                .map(|n| 50.0 * (n as f32 * 0.3).sin())
                .collect();
            agc.process(&mut block).unwrap();
            last = block;
        }
        let peak = last.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(peak > 250.0 && peak < 1000.0, "peak {}", peak);
        assert!(control.current() > 1.0);
    }

    #[test]
    fn test_agc_fixed_gain_overrides_tracking() {
        let (mut agc, control) = Agc::new(500.0);
        control.set_fixed(3.0);
        let mut block = vec![10.0; 8];
        agc.process(&mut block).unwrap();
        assert_eq!(block, vec![30.0; 8]);
        assert_eq!(control.current(), 3.0);
    }
}

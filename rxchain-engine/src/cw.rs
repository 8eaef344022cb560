//! CW (Morse) demodulator.
//!
//! The tuned carrier is mixed down to a fixed audible tone and isolated
//! with a narrow band-pass around that tone.

use crate::dsp::design::BiquadCoeffs;
use crate::dsp::filter::{Biquads, HumFilter};
use crate::dsp::gain::Gain;
use crate::dsp::mixer::Multiplier;
use crate::dsp::{Chain, Flow, Level, Setting, Stage, StageId};
use crate::receiver::{Demodulator, OptionRegistry, OptionValue, ReceiverOption};
use crate::{Error, Result};
use log::{debug, error, info};
use rxchain_messages::{Config, SampleShape};

pub const CW_TONE_FREQUENCY: i64 = 850;
const PRESELECT_Q: f32 = 0.8071;
const LOWPASS_CUTOFF: f32 = 1000.0;
const LOWPASS_Q: f32 = 0.7071;
const HUM_CUTOFF: u32 = 600;
const BANDPASS_SECTIONS: usize = 4;
const DEFAULT_GAIN: i32 = 4;
const DEFAULT_FREQUENCY: i64 = 17_200;

const HUMFILTER: &str = "humfilter";
const BANDWIDTH: &str = "bandwidth";

/// Band-pass sections whose cascade is `bandwidth` Hz wide at the tone.
fn tone_bandpass(rate: u32, bandwidth: i32) -> Vec<BiquadCoeffs> {
    // Each identical section narrows the cascade by sqrt(2^(1/n) - 1)
    let narrowing = (2f32.powf(1.0 / BANDPASS_SECTIONS as f32) - 1.0).sqrt();
    let section_width = bandwidth.max(1) as f32 / narrowing;
    let q = CW_TONE_FREQUENCY as f32 / section_width;
    vec![BiquadCoeffs::bandpass(CW_TONE_FREQUENCY as f32, rate as f32, q); BANDPASS_SECTIONS]
}

/// Preselect band-pass followed by the mixer. Both follow one frequency
/// setting, so a retune reaches the filter and the oscillator on the same
/// block.
struct Preselector {
    rate: u32,
    preselect: Biquads,
    mixer: Multiplier,
    frequency: Setting<i64>,
}

impl Preselector {
    fn new(rate: u32, frequency: i64) -> (Self, Setting<i64>) {
        let control = Setting::new();
        let (preselect, _) = Biquads::single(Self::preselect(rate, frequency));
        let (mixer, _) = Multiplier::new(rate, (frequency - CW_TONE_FREQUENCY) as f64);
        (
            Self {
                rate,
                preselect,
                mixer,
                frequency: control.clone(),
            },
            control,
        )
    }

    fn preselect(rate: u32, frequency: i64) -> BiquadCoeffs {
        BiquadCoeffs::bandpass(frequency as f32, rate as f32, PRESELECT_Q)
    }
}

impl Stage for Preselector {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if let Some(frequency) = self.frequency.take() {
            self.preselect.apply(vec![Self::preselect(self.rate, frequency)]);
            self.mixer
                .oscillator()
                .set_frequency((frequency - CW_TONE_FREQUENCY) as f64);
        }
        self.preselect.filter(block);
        self.mixer.mix(block);
        Ok(Flow::Forward)
    }
}

/// Handles on the stages of a built CW chain.
struct Controls {
    hum: Setting<u32>,
    gain: Level,
    tuning: Setting<i64>,
    bandpass: Setting<Vec<BiquadCoeffs>>,
}

/// Hum filter, gain, preselect, mixer, narrow band-pass and smoothing.
pub struct CwDemodulator {
    rate: u32,
    frequency: i64,
    gain: i32,
    controls: Option<Controls>,
}

impl Default for CwDemodulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CwDemodulator {
    pub fn new() -> Self {
        Self {
            rate: 0,
            frequency: 0,
            gain: DEFAULT_GAIN,
            controls: None,
        }
    }

    /// Frequency the mixer and preselect are tuned to.
    pub fn frequency(&self) -> i64 {
        self.frequency
    }

    /// Mixer offset: tuned frequency minus the tone.
    pub fn mixer_frequency(&self) -> i64 {
        self.frequency - CW_TONE_FREQUENCY
    }

    pub fn gain(&self) -> i32 {
        self.gain
    }

    fn in_range(rate: u32, frequency: i64) -> bool {
        frequency > CW_TONE_FREQUENCY && frequency < rate as i64 / 2
    }
}

impl Demodulator for CwDemodulator {
    fn name(&self) -> &str {
        "CW"
    }

    fn options(&self) -> Vec<ReceiverOption> {
        vec![
            ReceiverOption::new(
                HUMFILTER,
                "Mains hum filter",
                vec![
                    OptionValue::new("off", 0),
                    OptionValue::new("50Hz", 50),
                    OptionValue::new("60Hz", 60),
                ],
                50,
            ),
            ReceiverOption::new(
                BANDWIDTH,
                "Width of the tone filter",
                vec![
                    OptionValue::new("60Hz", 60),
                    OptionValue::new("100Hz", 100),
                    OptionValue::new("250Hz", 250),
                ],
                100,
            ),
        ]
    }

    fn is_shape_supported(&self, shape: SampleShape) -> bool {
        shape == SampleShape::Real
    }

    fn pre_process(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        self.rate = config.output_sample_rate;
        let fundamental = options.get(HUMFILTER).unwrap_or(50).max(0) as u32;
        debug!("CW hum filter at {} Hz", fundamental);
        let (hum, hum_control) = HumFilter::new(self.rate, fundamental, HUM_CUTOFF);
        let upstream = chain.attach(upstream, "cw_hum_filter", hum);

        let (gain, gain_control) = Gain::new(self.gain as f32);
        let upstream = chain.attach(upstream, "cw_prefilter_gain", gain);

        // Completed by receive()
        self.controls = Some(Controls {
            hum: hum_control,
            gain: gain_control,
            tuning: Setting::new(),
            bandpass: Setting::new(),
        });
        Ok(upstream)
    }

    fn receive(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        let controls = self.controls.as_mut().ok_or(Error::NotBuilt)?;
        self.frequency = config.frequency;
        info!("CW receiver at {} Hz, tone {} Hz", self.frequency, CW_TONE_FREQUENCY);

        let (preselector, tuning) = Preselector::new(self.rate, self.frequency);
        let upstream = chain.attach(upstream, "cw_preselect_mixer", preselector);

        let bandwidth = options.get(BANDWIDTH).unwrap_or(100);
        let (bandpass, bandpass_control) = Biquads::new(tone_bandpass(self.rate, bandwidth));
        let upstream = chain.attach(upstream, "cw_bandpass", bandpass);

        controls.tuning = tuning;
        controls.bandpass = bandpass_control;
        Ok(upstream)
    }

    fn post_process(
        &mut self,
        _config: &Config,
        _options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        let (lowpass, _) = Biquads::single(BiquadCoeffs::lowpass(
            LOWPASS_CUTOFF,
            self.rate as f32,
            LOWPASS_Q,
        ));
        Ok(chain.attach(upstream, "cw_lowpass", lowpass))
    }

    fn option_changed(&mut self, _config: &Config, name: &str, value: i32) {
        let Some(controls) = self.controls.as_ref() else {
            return;
        };
        match name {
            HUMFILTER => {
                info!("CW hum filter now {} Hz", value);
                controls.hum.set(value.max(0) as u32);
            }
            BANDWIDTH => {
                info!("CW bandwidth now {} Hz", value);
                controls.bandpass.set(tone_bandpass(self.rate, value));
            }
            _ => debug!("CW receiver ignores option {}", name),
        }
    }

    fn default_frequency(&self, config: &Config) -> i64 {
        if Self::in_range(config.output_sample_rate, DEFAULT_FREQUENCY) {
            DEFAULT_FREQUENCY
        } else {
            config.output_sample_rate as i64 / 4
        }
    }

    fn is_frequency_supported(&self, config: &Config, frequency: i64) -> bool {
        Self::in_range(config.output_sample_rate, frequency)
    }

    fn set_frequency(&mut self, frequency: i64) -> Result<()> {
        let controls = self.controls.as_ref().ok_or(Error::NotBuilt)?;
        if !Self::in_range(self.rate, frequency) {
            error!(
                "Unsupported frequency {}, must be above {} and below {}",
                frequency,
                CW_TONE_FREQUENCY,
                self.rate / 2
            );
            return Err(Error::UnsupportedFrequency(frequency));
        }
        controls.tuning.set(frequency);
        self.frequency = frequency;
        Ok(())
    }

    fn set_gain(&mut self, gain: i32) -> Result<()> {
        if !(1..=100).contains(&gain) {
            error!("Unsupported gain {}, must be between 1 and 100", gain);
            return Err(Error::UnsupportedGain(gain));
        }
        if let Some(controls) = self.controls.as_ref() {
            controls.gain.set(gain as f32);
        }
        self.gain = gain;
        Ok(())
    }
}

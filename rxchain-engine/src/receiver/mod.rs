//! Receiver lifecycle: option replay, gain control, the demodulator hooks
//! and the output splitter.

mod mode;
mod options;

pub use mode::ReceiverMode;
pub use options::{Change, OptionRegistry, OptionValue, ReceiverOption};

use crate::dsp::flow::{Delay, Gate, PassThrough};
use crate::dsp::gain::Agc;
use crate::dsp::io::{DumpWriter, dump_path};
use crate::dsp::{AgcControl, Chain, FftTap, Stage, StageId, Switch};
use crate::input::InputPipeline;
use crate::spectrum::SpectrumSnapshot;
use crate::{Error, Result};
use log::{debug, error, info, warn};
use rxchain_messages::{Config, SampleShape};

pub const AUDIO_FFT_SIZE: usize = 256;
const AUDIO_FFT_AVERAGING: usize = 4;
const AUDIO_FFT_SKIP: usize = 4;

/// The hooks a demodulator provides to the receiver.
///
/// `pre_process`, `receive` and `post_process` are called once, in that
/// order, while the receiver is built. Each attaches its stages after
/// `upstream` and returns the last stage it added.
pub trait Demodulator: Send {
    /// Name used for persisted options and logging.
    fn name(&self) -> &str;

    /// Options with their default values.
    fn options(&self) -> Vec<ReceiverOption>;

    fn is_shape_supported(&self, shape: SampleShape) -> bool;

    fn pre_process(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId>;

    fn receive(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId>;

    fn post_process(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId>;

    /// Called after a successful option change on a built receiver.
    fn option_changed(&mut self, config: &Config, name: &str, value: i32);

    fn default_frequency(&self, config: &Config) -> i64;

    fn is_frequency_supported(&self, config: &Config, frequency: i64) -> bool;

    /// Validate and apply a new frequency. Leaves the tuning untouched on error.
    fn set_frequency(&mut self, frequency: i64) -> Result<()>;

    /// Set the demodulator's own gain stage.
    fn set_gain(&mut self, gain: i32) -> Result<()>;
}

/// Linear gain of a signed gain setting: -N is 1/N.
pub fn linear_gain(gain: i32) -> f32 {
    if gain > 0 {
        gain as f32
    } else {
        1.0 / (-gain) as f32
    }
}

struct Output {
    splitter: StageId,
    dump: Switch,
    spectrum: SpectrumSnapshot,
}

/// A receiver built from a demodulator.
pub struct Receiver<D: Demodulator> {
    demodulator: D,
    options: OptionRegistry,
    frequency: i64,
    gain_value: i32,
    agc: AgcControl,
    output: Option<Output>,
}

impl<D: Demodulator> Receiver<D> {
    pub fn new(demodulator: D) -> Self {
        let options = OptionRegistry::new(demodulator.options());
        Self {
            demodulator,
            options,
            frequency: 0,
            gain_value: 0,
            agc: AgcControl::new(),
            output: None,
        }
    }

    pub fn name(&self) -> &str {
        self.demodulator.name()
    }

    pub fn demodulator(&self) -> &D {
        &self.demodulator
    }

    pub fn options(&self) -> &OptionRegistry {
        &self.options
    }

    pub fn is_built(&self) -> bool {
        self.output.is_some()
    }

    /// Target level of the receiver AGC. I/Q sources carry the energy of
    /// both channels.
    pub fn agc_level(config: &Config) -> f32 {
        let level = config.rf_agc_level as f32;
        match config.sample_shape {
            SampleShape::Iq | SampleShape::I | SampleShape::Q => level * 4.0,
            SampleShape::Real => level,
        }
    }

    /// Attach the receiver to the input pipeline.
    pub fn build(
        &mut self,
        config: &mut Config,
        input: &mut InputPipeline,
        decoder: Option<Box<dyn Stage>>,
    ) -> Result<()> {
        if self.is_built() {
            return Err(Error::AlreadyBuilt);
        }
        let name = self.name().to_string();
        if !self.demodulator.is_shape_supported(config.sample_shape) {
            error!("{} receiver does not take {:?} input", name, config.sample_shape);
            return Err(Error::config(format!(
                "{} receiver does not support {:?} input",
                name, config.sample_shape
            )));
        }
        info!("Building {} receiver", name);

        // Stored options first, then the ones given on the command line
        let stored = config.receiver_options_for(&name);
        let overrides = config.receiver_option_overrides.clone();
        for (option, label) in stored.iter().chain(overrides.iter()) {
            if let Err(e) = self.set_option(config, option, label) {
                warn!("Ignoring option {}={}: {}", option, label, e);
            }
        }

        if !self.demodulator.is_frequency_supported(config, config.frequency) {
            let default = self.demodulator.default_frequency(config);
            warn!(
                "Frequency {} is not valid for the {} receiver, using {}",
                config.frequency, name, default
            );
            config.frequency = default;
        }
        self.frequency = config.frequency;

        let (chain, upstream) = input.attach_point()?;

        self.gain_value = config.rf_gain;
        if config.rf_gain != 0 {
            if config.rf_gain_enabled {
                self.agc.set_fixed(linear_gain(config.rf_gain));
            } else {
                self.agc.set_fixed(1.0);
            }
        }
        let agc = Agc::with_control(Self::agc_level(config), self.agc.clone());
        let agc = chain.attach(upstream, "receiver_agc", agc);

        let config = &*config;
        let pre = self.demodulator.pre_process(config, &self.options, chain, agc)?;
        let received = self.demodulator.receive(config, &self.options, chain, pre)?;
        let post = self.demodulator.post_process(config, &self.options, chain, received)?;

        let splitter = chain.attach(post, "receiver_decoder_splitter", PassThrough);
        if let Some(decoder) = decoder {
            debug!("Attaching decoder");
            chain.attach(splitter, "receiver_decoder", decoder);
        }

        let (fft, spectrum) = FftTap::new(AUDIO_FFT_SIZE, false, AUDIO_FFT_AVERAGING, AUDIO_FFT_SKIP);
        chain.attach(splitter, "receiver_audio_spectrum", fft);

        let rate = config.output_sample_rate;
        let mut dump_upstream = splitter;
        if config.dump_delay > 0 {
            dump_upstream = chain.attach(
                dump_upstream,
                "receiver_audio_delay",
                Delay::seconds(rate, 1, config.dump_delay),
            );
        }
        let (gate, dump) = Gate::new(config.dump_audio);
        let gate = chain.attach(dump_upstream, "receiver_audio_breaker", gate);
        let path = dump_path(
            &config.dump_dir,
            "AUDIO",
            config.dump_suffix.as_deref(),
            config.dump_format,
        );
        chain.attach(
            gate,
            "receiver_audio_writer",
            DumpWriter::new(path, config.dump_format, rate, 1),
        );

        self.output = Some(Output {
            splitter,
            dump,
            spectrum,
        });
        info!("{} receiver built at {} Hz", name, self.frequency);
        Ok(())
    }

    /// Set an option by label. Changes are persisted in `config` and, once
    /// built, handed to the demodulator.
    pub fn set_option(&mut self, config: &mut Config, name: &str, label: &str) -> Result<Change> {
        info!("Setting option '{}' to '{}'", name, label);
        let (value, change) = self.options.set_label(name, label)?;
        self.changed(config, name, value, change);
        Ok(change)
    }

    /// Set an option by value.
    pub fn set_option_value(&mut self, config: &mut Config, name: &str, value: i32) -> Result<Change> {
        let change = self.options.set_value(name, value)?;
        self.changed(config, name, value, change);
        Ok(change)
    }

    fn changed(&mut self, config: &mut Config, name: &str, value: i32, change: Change) {
        if change == Change::Unchanged {
            return;
        }
        let mode = self.demodulator.name().to_string();
        config.set_receiver_options_for(&mode, self.options.snapshot());
        if self.is_built() {
            self.demodulator.option_changed(config, name, value);
        }
    }

    /// Last requested frequency, whether or not the demodulator took it.
    pub fn frequency(&self) -> i64 {
        self.frequency
    }

    /// Store the requested frequency, then hand it to the demodulator.
    pub fn set_frequency(&mut self, config: &mut Config, frequency: i64) -> Result<()> {
        self.frequency = frequency;
        config.frequency = frequency;
        if !self.is_built() {
            return Err(Error::NotBuilt);
        }
        self.demodulator.set_frequency(frequency)
    }

    /// Set the receiver gain: 0 hands control to the AGC, positive values
    /// amplify and negative values attenuate. Returns the linear gain set,
    /// 0 for automatic.
    pub fn set_rf_gain(&mut self, config: &mut Config, gain: i32) -> f32 {
        self.gain_value = gain;
        config.rf_gain = gain;
        if gain == 0 {
            info!("Receiver gain under AGC control");
            self.agc.set_auto();
            return 0.0;
        }
        let linear = linear_gain(gain);
        info!("Receiver gain {} ({})", gain, linear);
        self.agc.set_fixed(linear);
        linear
    }

    /// Switch between the configured gain and unity gain.
    pub fn set_rf_gain_enabled(&mut self, config: &mut Config, enabled: bool) {
        config.rf_gain_enabled = enabled;
        if enabled {
            let gain = self.gain_value;
            self.set_rf_gain(config, gain);
        } else {
            self.agc.set_fixed(1.0);
        }
    }

    /// Gain currently applied by the receiver AGC.
    pub fn current_gain(&self) -> f32 {
        self.agc.current()
    }

    pub fn set_demodulator_gain(&mut self, gain: i32) -> Result<()> {
        self.demodulator.set_gain(gain)
    }

    /// Open or close the audio dump gate. Returns whether the dump is enabled.
    pub fn set_dump_enabled(&self, enabled: bool) -> bool {
        match self.output.as_ref() {
            Some(output) => {
                output.dump.set(enabled);
                output.dump.is_on()
            }
            None => false,
        }
    }

    /// Latest audio spectrum with its generation.
    pub fn spectrum(&self) -> (Vec<f32>, u64) {
        match self.output.as_ref() {
            Some(output) => output.spectrum.read(),
            None => (Vec::new(), 0),
        }
    }

    /// The output splitter, once built.
    pub fn output(&self) -> Option<StageId> {
        self.output.as_ref().map(|o| o.splitter)
    }
}

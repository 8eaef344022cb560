//! Input pipeline: from the configured source to a filtered IF stream.

use crate::decimation::{self, DecimationPlan};
use crate::device::{DeviceDrivers, TunerSettings};
use crate::dsp::decimate::{Decimator, FirDecimator, IqFirDecimator, StageReader};
use crate::dsp::filter::{Fir, IqFir, Taps};
use crate::dsp::flow::{Delay, Gate, PassThrough};
use crate::dsp::gain::{Agc, Gain};
use crate::dsp::io::{DumpWriter, PcmReader, Silence, ToneGenerator, WavReader, dump_path};
use crate::dsp::mixer::IqMultiplier;
use crate::dsp::{Chain, FftTap, Level, Reader, StageId, Switch, design};
use crate::frequency::FrequencyTriple;
use crate::network::{Publisher, Subscriber};
use crate::processor::{Processor, Sink};
use crate::spectrum::SpectrumSnapshot;
use crate::{BLOCK_SIZE, Error, Result};
use log::{debug, error, info};
use rxchain_messages::{Config, DeviceCommand, RemoteRole, SampleShape, SourceType};

pub const RF_FFT_SIZE: usize = 1024;
const RF_FFT_AVERAGING: usize = 4;
const RF_FFT_SKIP: usize = 4;
const INPUT_FILTER_TAPS: usize = 51;
const GENERATOR_AMPLITUDE: f32 = 1000.0;

/// Signal gain and spectrum gain for a preamp level.
pub fn preamp_gains(level: i32) -> (f32, f32) {
    match level {
        0 => (1.0, 1.0),
        1 => (4.0, 2.0),
        l if l > 1 => (8.0, 4.0),
        -1 => (0.25, 0.5),
        _ => (0.0625, 0.25),
    }
}

/// The band-select filter ahead of the receiver.
enum InputFilter {
    Iq(Taps),
    Real(Taps),
}

/// Controls that only exist when the chain is built locally.
struct LocalControls {
    output: StageId,
    dump: Switch,
    preamp: Level,
    fft_gain: Level,
    spectrum: SpectrumSnapshot,
    filter: Option<InputFilter>,
}

/// Source, decimation, RF splitter, preamp, shift and input filter.
///
/// Built in a fixed order from the configuration. When publishing to a
/// remote receiver only the source and decimation are built.
pub struct InputPipeline {
    source_type: SourceType,
    original_source_type: SourceType,
    shape: SampleShape,
    output_rate: u32,
    frequencies: FrequencyTriple,
    decimation: Option<DecimationPlan>,
    decimation_factors: Vec<u32>,
    local: Option<LocalControls>,
    processor: Processor,
}

fn from_tuner(source: SourceType, original: SourceType) -> bool {
    source.is_complex_only()
        || (matches!(
            source,
            SourceType::PcmFile | SourceType::WavFile | SourceType::Network
        ) && original.is_complex_only())
}

fn iq_taps(rate: u32, width: u32) -> Vec<f32> {
    let cutoff = if width == 0 { rate / 2 } else { width };
    design::low_pass(rate, cutoff as f32, INPUT_FILTER_TAPS)
}

fn real_taps(rate: u32, if_frequency: i64, width: u32) -> Vec<f32> {
    if width == 0 {
        return design::low_pass(rate, (rate / 2) as f32, INPUT_FILTER_TAPS);
    }
    let center = if_frequency as f32;
    let half = width as f32 / 2.0;
    design::band_pass(rate, center - half, center + half, INPUT_FILTER_TAPS)
}

fn open_reader(
    config: &Config,
    frequencies: &FrequencyTriple,
    drivers: &dyn DeviceDrivers,
) -> Result<Box<dyn Reader>> {
    let rate = config.input_sample_rate;
    let shape = config.sample_shape;
    Ok(match config.source_type {
        SourceType::AudioDevice => {
            info!("Opening audio input device {}", config.audio_device);
            drivers.open_audio(config.audio_device, rate)?
        }
        SourceType::SignalGenerator => {
            info!("Signal generator at {} Hz", config.signal_generator_frequency);
            Box::new(ToneGenerator::new(
                rate,
                config.signal_generator_frequency as f64,
                GENERATOR_AMPLITUDE,
            ))
        }
        SourceType::PcmFile => {
            let path = config
                .pcm_file
                .as_deref()
                .ok_or_else(|| Error::config("no pcm input file given"))?;
            Box::new(PcmReader::open(path)?)
        }
        SourceType::WavFile => {
            let path = config
                .wav_file
                .as_deref()
                .ok_or_else(|| Error::config("no wav input file given"))?;
            Box::new(WavReader::open(path)?)
        }
        SourceType::Silence => {
            let channels = if shape.is_complex() { 2 } else { 1 };
            Box::new(Silence::new(rate, channels))
        }
        SourceType::RtlSdr => {
            info!(
                "Opening tuner {} for {:?} samples, offset {} correction {} gain {}",
                config.device.index,
                shape,
                config.device.offset,
                config.device.correction,
                config.device.gain
            );
            drivers.open_tuner(&TunerSettings {
                index: config.device.index,
                sample_rate: rate,
                frequency: frequencies.hardware_frequency,
                gain: config.device.gain,
                correction: config.device.correction,
                mode: shape.into(),
            })?
        }
        SourceType::None | SourceType::Network => {
            error!("Unknown input source type {:?}", config.source_type);
            return Err(Error::config(format!(
                "unknown input source type {:?}",
                config.source_type
            )));
        }
    })
}

/// Decimated reader and the factors of the stages built.
type Decimated = (Box<dyn Reader>, Vec<u32>);

/// Decimation factors for the source. Only the hardware tuner decimates,
/// every other source is read at the rate it delivers.
fn decimation_plan(config: &Config) -> Result<Option<DecimationPlan>> {
    if config.source_type != SourceType::RtlSdr {
        debug!("Input is not a hardware tuner, no decimation needed");
        return Ok(None);
    }
    let (input, output) = (config.input_sample_rate, config.output_sample_rate);
    if input == output {
        debug!("No decimation needed");
        return Ok(None);
    }
    if output == 0 || input % output != 0 {
        return Err(Error::config(format!(
            "no integer divisor takes {} Hz down to {} Hz",
            input, output
        )));
    }
    decimation::plan(input, output, BLOCK_SIZE as u32)
        .map(Some)
        .ok_or_else(|| {
            error!("No decimation factors from {} to {}", input, output);
            Error::config(format!("no decimation factors from {} Hz to {} Hz", input, output))
        })
}

fn decimate(config: &Config, plan: DecimationPlan, reader: Box<dyn Reader>) -> Decimated {
    let (input, output) = (config.input_sample_rate, config.output_sample_rate);

    // Make up for the insertion loss of the decimating filters
    let reader: Box<dyn Reader> = if config.decimator_gain > 0 {
        info!("Fixed gain {} ahead of the decimator", config.decimator_gain);
        let (gain, _) = Gain::new(config.decimator_gain as f32);
        Box::new(StageReader::new(reader, gain))
    } else {
        info!("AGC at level {} ahead of the decimator", config.decimator_agc_level);
        let (agc, _) = Agc::new(config.decimator_agc_level as f32);
        Box::new(StageReader::new(reader, agc))
    };

    let taps = design::low_pass(input, config.decimator_cutoff as f32, config.fir_filter_size);
    let first = plan.first as usize;
    info!(
        "Decimating {} -> {} -> {} ({} x {})",
        input,
        input / plan.first,
        output,
        plan.first,
        plan.second
    );

    let mut factors = vec![plan.first];
    let reader: Box<dyn Reader> = if config.sample_shape.is_complex() {
        let reader: Box<dyn Reader> = Box::new(IqFirDecimator::new(reader, first, taps));
        if plan.second > 1 {
            factors.push(plan.second);
            Box::new(Decimator::iq(reader, plan.second as usize))
        } else {
            reader
        }
    } else {
        let reader: Box<dyn Reader> = Box::new(FirDecimator::new(reader, first, taps));
        if plan.second > 1 {
            // The real valued cleanup stage always decimates by 3
            factors.push(3);
            Box::new(Decimator::real(reader, 3))
        } else {
            reader
        }
    };
    (reader, factors)
}

fn build_chain(
    config: &Config,
    frequencies: &FrequencyTriple,
    chain: &mut Chain,
    root: StageId,
) -> LocalControls {
    let rate = config.output_sample_rate;
    let complex = config.sample_shape.is_complex();
    let channels: u16 = if complex { 2 } else { 1 };

    // RF dump: delay, gate and writer
    let mut upstream = root;
    if config.dump_delay > 0 {
        upstream = chain.attach(
            upstream,
            "input_rf_delay",
            Delay::seconds(rate, channels as usize, config.dump_delay),
        );
    }
    let (gate, dump) = Gate::new(config.dump_rf);
    let gate = chain.attach(upstream, "input_rf_breaker", gate);
    let path = dump_path(
        &config.dump_dir,
        "INPUT",
        config.dump_suffix.as_deref(),
        config.dump_format,
    );
    chain.attach(
        gate,
        "input_rf_writer",
        DumpWriter::new(path, config.dump_format, rate, channels),
    );

    // RF spectrum
    let (fft_gain_stage, fft_gain) = Gain::new(1.0);
    let fft_gain_id = chain.attach(root, "input_rf_spectrum_gain", fft_gain_stage);
    let (fft, spectrum) = FftTap::new(RF_FFT_SIZE, complex, RF_FFT_AVERAGING, RF_FFT_SKIP);
    chain.attach(fft_gain_id, "input_rf_spectrum_output", fft);

    // Preamp
    let (preamp_stage, preamp) = Gain::new(1.0);
    let mut output = chain.attach(root, "input_preamp_gain", preamp_stage);
    let (gain, spectrum_gain) = preamp_gains(config.preamp);
    preamp.set(gain);
    fft_gain.set(spectrum_gain);

    let mut controls = LocalControls {
        output,
        dump,
        preamp,
        fft_gain,
        spectrum,
        filter: None,
    };
    if config.source_type.is_local() {
        debug!("Local source, no shift and no input filter");
        return controls;
    }

    // Move the signal back from the tuning offset
    if config.original_source_type == SourceType::RtlSdr
        && (config.device.offset != 0 || config.device.correction != 0)
    {
        let shift = -config.device.offset - config.device.correction * config.device.correction_factor;
        info!("IF multiplier with shift {}", shift);
        let (mixer, _) = IqMultiplier::new(rate, shift as f64);
        output = chain.attach(output, "input_if_multiplier", mixer);
    }

    let width = config.input_filter_width;
    let filter = if complex {
        let (fir, taps) = IqFir::new(iq_taps(rate, width));
        output = chain.attach(output, "input_iq_fir", fir);
        InputFilter::Iq(taps)
    } else {
        let (fir, taps) = Fir::new(real_taps(
            rate,
            frequencies.if_frequency,
            width,
        ));
        output = chain.attach(output, "input_fir", fir);
        InputFilter::Real(taps)
    };

    controls.output = output;
    controls.filter = Some(filter);
    controls
}

impl InputPipeline {
    pub fn new(config: &mut Config, drivers: &dyn DeviceDrivers) -> Result<Self> {
        let role = config.remote.role;
        let shape = config.sample_shape;

        if shape == SampleShape::Real && from_tuner(config.source_type, config.original_source_type) {
            error!("Real valued samples requested from an I/Q device");
            return Err(Error::config(
                "real valued samples can not be read from an I/Q device",
            ));
        }

        if matches!(config.source_type, SourceType::PcmFile | SourceType::WavFile) && shape.is_complex() {
            info!("Input file holds I/Q data, zeroing frequency, shift and adjust");
            config.frequency = 0;
            config.shift = 0;
            config.device.adjust = 0;
        }

        let frequencies = FrequencyTriple::compute(config, config.frequency);

        let (reader, decimation, decimation_factors) = if role == RemoteRole::Client {
            let subscriber = Subscriber::connect(
                &config.remote.server,
                config.remote.data_port,
                config.remote.command_port,
            )?;
            (Box::new(subscriber) as Box<dyn Reader>, None, Vec::new())
        } else {
            let plan = decimation_plan(config)?;
            let reader = open_reader(config, &frequencies, drivers)?;
            match plan {
                Some(plan) => {
                    let (reader, factors) = decimate(config, plan, reader);
                    (reader, Some(plan), factors)
                }
                None => (reader, None, Vec::new()),
            }
        };

        let (processor, local) = if role == RemoteRole::Server {
            info!("Publishing input to remote receivers");
            let publisher = Publisher::bind(config.remote.data_port, config.remote.command_port)?;
            let processor = Processor::new("input_network_processor", reader, Sink::Publish(publisher));
            (processor, None)
        } else {
            let mut chain = Chain::new();
            let root = chain.add("input_rf_splitter", PassThrough);
            let local = build_chain(config, &frequencies, &mut chain, root);
            let processor = Processor::new("input_stream_processor", reader, Sink::Local { chain, root });
            (processor, Some(local))
        };

        Ok(Self {
            source_type: config.source_type,
            original_source_type: config.original_source_type,
            shape,
            output_rate: config.output_sample_rate,
            frequencies,
            decimation,
            decimation_factors,
            local,
            processor,
        })
    }

    /// Tune to a new virtual frequency.
    pub fn retune(&mut self, config: &Config, frequency: i64) -> FrequencyTriple {
        self.frequencies = FrequencyTriple::compute(config, frequency);

        if config.input_filter_width > 0 {
            if let Some(InputFilter::Real(taps)) = self.local.as_ref().and_then(|l| l.filter.as_ref()) {
                taps.set(real_taps(
                    self.output_rate,
                    self.frequencies.if_frequency,
                    config.input_filter_width,
                ));
            }
        }

        if self.source_type.is_local() {
            debug!("Local source, no tuner command");
            return self.frequencies;
        }

        if self.source_type == SourceType::RtlSdr || self.original_source_type == SourceType::RtlSdr {
            let hardware = self.frequencies.hardware_frequency;
            info!("Setting tuner frequency {}", hardware);
            if let Err(e) = self.processor.command(DeviceCommand::set_frequency(hardware)) {
                error!("Failed to retune to {}: {}", hardware, e);
            }
        }
        self.frequencies
    }

    /// Open or close the RF dump gate. Returns whether the dump is enabled.
    pub fn set_dump_enabled(&self, enabled: bool) -> bool {
        match self.local.as_ref() {
            Some(local) => {
                local.dump.set(enabled);
                local.dump.is_on()
            }
            None => false,
        }
    }

    pub fn set_preamp_level(&self, level: i32) {
        if let Some(local) = self.local.as_ref() {
            let (gain, spectrum_gain) = preamp_gains(level);
            debug!("Preamp level {}: gain {} spectrum gain {}", level, gain, spectrum_gain);
            local.preamp.set(gain);
            local.fft_gain.set(spectrum_gain);
        }
    }

    /// Replace the input filter coefficients for a new width, 0 meaning the
    /// default low-pass. Returns false when there is no input filter.
    pub fn set_filter_width(&self, config: &mut Config, width: u32) -> bool {
        config.input_filter_width = width;
        match self.local.as_ref().and_then(|l| l.filter.as_ref()) {
            Some(InputFilter::Iq(taps)) => {
                info!("Input filter width {} for the I/Q filter", width);
                taps.set(iq_taps(self.output_rate, width));
                true
            }
            Some(InputFilter::Real(taps)) => {
                info!("Input filter width {} for the real filter", width);
                taps.set(real_taps(self.output_rate, self.frequencies.if_frequency, width));
                true
            }
            None => false,
        }
    }

    pub fn run(&mut self, blocks: Option<u64>) -> Result<()> {
        self.processor.run(blocks)
    }

    pub fn halt(&mut self) -> Result<()> {
        self.processor.halt()
    }

    pub fn wait(&mut self) -> Result<()> {
        self.processor.wait()
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.processor.is_finished()
    }

    /// Latest RF spectrum with its generation. Empty when publishing.
    pub fn spectrum(&self) -> (Vec<f32>, u64) {
        match self.local.as_ref() {
            Some(local) => local.spectrum.read(),
            None => (Vec::new(), 0),
        }
    }

    pub fn frequencies(&self) -> FrequencyTriple {
        self.frequencies
    }

    pub fn sample_shape(&self) -> SampleShape {
        self.shape
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn decimation(&self) -> Option<DecimationPlan> {
        self.decimation
    }

    /// Factors of the decimation stages actually built.
    pub fn decimation_factors(&self) -> &[u32] {
        &self.decimation_factors
    }

    /// Whether a receiver can be attached.
    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    /// The chain and the stage the receiver attaches to.
    pub(crate) fn attach_point(&mut self) -> Result<(&mut Chain, StageId)> {
        let output = self
            .local
            .as_ref()
            .map(|l| l.output)
            .ok_or_else(|| Error::config("input is published to a remote receiver"))?;
        Ok((self.processor.chain_mut()?, output))
    }

    /// Stage names of the local chain in creation order.
    pub fn stage_names(&mut self) -> Result<Vec<String>> {
        Ok(self
            .processor
            .chain_mut()?
            .names()
            .into_iter()
            .map(String::from)
            .collect())
    }
}

//! Argument parsing for running from the command line

use clap::{ArgAction, Parser, ValueEnum};
use rxchain_messages::{Config, DumpFormat, RemoteRole, SampleShape, SourceType};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Input {
    Audio,
    Generator,
    Pcm,
    Wav,
    Silence,
    Rtlsdr,
    Remote,
}

impl From<Input> for SourceType {
    fn from(input: Input) -> Self {
        match input {
            Input::Audio => SourceType::AudioDevice,
            Input::Generator => SourceType::SignalGenerator,
            Input::Pcm => SourceType::PcmFile,
            Input::Wav => SourceType::WavFile,
            Input::Silence => SourceType::Silence,
            Input::Rtlsdr => SourceType::RtlSdr,
            Input::Remote => SourceType::Network,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shape {
    Iq,
    I,
    Q,
    Real,
}

impl From<Shape> for SampleShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Iq => SampleShape::Iq,
            Shape::I => SampleShape::I,
            Shape::Q => SampleShape::Q,
            Shape::Real => SampleShape::Real,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Pcm,
    Wav,
}

impl From<Format> for DumpFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pcm => DumpFormat::Pcm,
            Format::Wav => DumpFormat::Wav,
        }
    }
}

/// Software receiver console. Settings not given are taken from the
/// stored configuration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input source
    #[arg(short, long)]
    pub input: Option<Input>,

    /// Source that originally produced a file or network input
    #[arg(long)]
    pub original_input: Option<Input>,

    /// Sample shape of the input
    #[arg(short, long)]
    pub shape: Option<Shape>,

    /// Input sample rate in Hz
    #[arg(long)]
    pub input_rate: Option<u32>,

    /// Output sample rate in Hz
    #[arg(long)]
    pub output_rate: Option<u32>,

    /// Frequency in Hz
    #[arg(short, long)]
    pub frequency: Option<i64>,

    /// Frequency shift in Hz (can be negative)
    #[arg(long, allow_hyphen_values = true)]
    pub shift: Option<i64>,

    /// Tuner device index
    #[arg(long)]
    pub device: Option<i32>,

    /// Tuner offset in Hz
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<i64>,

    /// Tuner frequency correction
    #[arg(long, allow_hyphen_values = true)]
    pub correction: Option<i64>,

    /// Multiplier applied to the correction when shifting back
    #[arg(long, allow_hyphen_values = true)]
    pub correction_factor: Option<i64>,

    /// Fine adjustment of the tuner frequency in Hz
    #[arg(long, allow_hyphen_values = true)]
    pub adjust: Option<i64>,

    /// Tuner gain in tenths of a dB, 0 for automatic
    #[arg(long)]
    pub tuner_gain: Option<i32>,

    /// Receiver gain: 0 for AGC, negative values attenuate
    #[arg(short, long, allow_hyphen_values = true)]
    pub gain: Option<i32>,

    /// Preamp level (-2..=2)
    #[arg(short, long, allow_hyphen_values = true)]
    pub preamp: Option<i32>,

    /// Input filter width in Hz, 0 for the default low-pass
    #[arg(short = 'w', long)]
    pub filter_width: Option<u32>,

    /// Fixed gain ahead of the decimator, 0 for AGC
    #[arg(long)]
    pub decimator_gain: Option<u32>,

    /// Input PCM file
    #[arg(long)]
    pub pcm_file: Option<PathBuf>,

    /// Input WAV file
    #[arg(long)]
    pub wav_file: Option<PathBuf>,

    /// Signal generator frequency in Hz
    #[arg(long)]
    pub generator_frequency: Option<i64>,

    /// Audio capture device
    #[arg(long)]
    pub audio_device: Option<i32>,

    /// Publish the input to remote receivers
    #[arg(long, conflicts_with = "remote")]
    pub remote_head: bool,

    /// Read the input from a remote head at this address
    #[arg(long)]
    pub remote: Option<String>,

    /// Remote head data port
    #[arg(long)]
    pub data_port: Option<u16>,

    /// Remote head command port
    #[arg(long)]
    pub command_port: Option<u16>,

    /// Dump the RF input from the start
    #[arg(long)]
    pub dump_rf: bool,

    /// Dump the audio output from the start
    #[arg(long)]
    pub dump_audio: bool,

    /// Format of dump files
    #[arg(long)]
    pub dump_format: Option<Format>,

    /// Suffix of dump file names instead of a timestamp
    #[arg(long)]
    pub dump_suffix: Option<String>,

    /// Directory for dump files
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Seconds of delay ahead of the dump writers
    #[arg(long)]
    pub dump_delay: Option<u32>,

    /// Receiver option as name=value, may be repeated
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    /// Discard the stored configuration
    #[arg(long, default_value_t = false)]
    pub reset: bool,

    /// Verbosity level (-v=debug, -vv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => {
            Ok((name.to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", s)),
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl Args {
    /// Override the stored settings with the ones given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = self.input {
            config.source_type = input.into();
            // A live source is its own origin
            if !matches!(input, Input::Pcm | Input::Wav | Input::Remote) {
                config.original_source_type = input.into();
            }
        }
        if let Some(original) = self.original_input {
            config.original_source_type = original.into();
        }
        if let Some(shape) = self.shape {
            config.sample_shape = shape.into();
        }

        set(&mut config.input_sample_rate, self.input_rate);
        set(&mut config.output_sample_rate, self.output_rate);
        set(&mut config.input_filter_width, self.filter_width);
        set(&mut config.dump_delay, self.dump_delay);
        set(&mut config.decimator_gain, self.decimator_gain);

        set(&mut config.frequency, self.frequency);
        set(&mut config.shift, self.shift);
        set(&mut config.device.offset, self.offset);
        set(&mut config.device.correction, self.correction);
        set(&mut config.device.correction_factor, self.correction_factor);
        set(&mut config.device.adjust, self.adjust);
        set(&mut config.signal_generator_frequency, self.generator_frequency);

        set(&mut config.device.index, self.device);
        set(&mut config.device.gain, self.tuner_gain);
        set(&mut config.rf_gain, self.gain);
        set(&mut config.preamp, self.preamp);
        set(&mut config.audio_device, self.audio_device);

        if self.pcm_file.is_some() {
            config.pcm_file = self.pcm_file.clone();
        }
        if self.wav_file.is_some() {
            config.wav_file = self.wav_file.clone();
        }

        if self.remote_head {
            config.remote.role = RemoteRole::Server;
        } else if let Some(server) = &self.remote {
            config.remote.role = RemoteRole::Client;
            config.remote.server = server.clone();
            config.source_type = SourceType::Network;
        } else {
            config.remote.role = RemoteRole::Local;
        }
        if let Some(port) = self.data_port {
            config.remote.data_port = port;
        }
        if let Some(port) = self.command_port {
            config.remote.command_port = port;
        }

        // Dumps only run when asked for on this run
        config.dump_rf = self.dump_rf;
        config.dump_audio = self.dump_audio;
        if let Some(format) = self.dump_format {
            config.dump_format = format.into();
        }
        config.dump_suffix = self.dump_suffix.clone();
        if let Some(dir) = &self.dump_dir {
            config.dump_dir = dir.clone();
        }

        config.receiver_option_overrides = self.options.iter().cloned().collect();
    }
}

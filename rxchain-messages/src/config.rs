use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Kind of raw sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceType {
    /// No source selected
    #[default]
    None,
    AudioDevice,
    SignalGenerator,
    PcmFile,
    WavFile,
    Silence,
    /// RTL-2832 based downconverting USB tuner
    RtlSdr,
    /// Samples streamed from a remote head
    Network,
}

impl SourceType {
    /// Strictly local sources never have any shift, offset or adjustment and
    /// never receive tuner commands.
    pub fn is_local(self) -> bool {
        matches!(
            self,
            SourceType::None
                | SourceType::AudioDevice
                | SourceType::SignalGenerator
                | SourceType::Silence
        )
    }

    /// Sources whose device family only delivers complex samples.
    pub fn is_complex_only(self) -> bool {
        matches!(self, SourceType::RtlSdr)
    }
}

/// Shape of the samples delivered by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SampleShape {
    /// Interleaved I/Q pairs
    Iq,
    /// Inphase channel only, carried as I/Q pairs with Q zeroed
    I,
    /// Quadrature channel only, carried as I/Q pairs with I zeroed
    Q,
    /// Real valued samples
    #[default]
    Real,
}

impl SampleShape {
    pub fn is_complex(self) -> bool {
        matches!(self, SampleShape::Iq | SampleShape::I | SampleShape::Q)
    }
}

/// File format used when dumping samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DumpFormat {
    Pcm,
    #[default]
    Wav,
}

impl DumpFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DumpFormat::Pcm => "pcm",
            DumpFormat::Wav => "wav",
        }
    }
}

/// Role of this process in a remote head setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RemoteRole {
    /// Everything runs locally
    #[default]
    Local,
    /// Publish raw samples to a remote receiver
    Server,
    /// Receive raw samples from a remote head
    Client,
}

/// Demodulator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReceiverModeType {
    #[default]
    Cw,
}

/// Remote head endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub role: RemoteRole,
    /// Address of the remote head (client role)
    pub server: String,
    pub data_port: u16,
    pub command_port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            role: RemoteRole::Local,
            server: String::new(),
            data_port: 0,
            command_port: 0,
        }
    }
}

/// Hardware tuner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device index for tuners and sound cards
    pub index: i32,
    /// Distance between the tuned and the requested frequency (LO leak avoidance)
    pub offset: i64,
    /// Frequency correction
    pub correction: i64,
    pub correction_factor: i64,
    /// Fine adjustment added to the hardware frequency
    pub adjust: i64,
    /// Tuner gain in tenths of a dB, 0 for automatic
    pub gain: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            index: 0,
            offset: 6000,
            correction: 0,
            correction_factor: 0,
            adjust: 0,
            gain: 0,
        }
    }
}

/// Configuration snapshot.
///
/// Supplied once at startup, changed through the engine's setters while
/// running, and persisted by the front end on shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_type: SourceType,
    /// Source the samples originally came from, for file and network replays
    pub original_source_type: SourceType,
    pub sample_shape: SampleShape,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,

    /// Requested (virtual) frequency
    pub frequency: i64,
    pub shift: i64,
    pub device: DeviceConfig,

    /// Width of the input band-select filter, 0 for the default low-pass
    pub input_filter_width: u32,
    pub preamp: i32,

    /// Fixed gain ahead of the decimator, 0 selects the AGC
    pub decimator_gain: u32,
    pub decimator_agc_level: u32,
    pub decimator_cutoff: u32,
    pub fir_filter_size: usize,

    /// Receiver gain, 0 for AGC, negative values attenuate
    pub rf_gain: i32,
    pub rf_gain_enabled: bool,
    pub rf_agc_level: u32,

    pub remote: RemoteConfig,

    pub dump_rf: bool,
    pub dump_audio: bool,
    pub dump_format: DumpFormat,
    /// Suffix for dump file names, a unix timestamp when unset
    pub dump_suffix: Option<String>,
    pub dump_dir: PathBuf,
    /// Delay in seconds between the splitter and the RF dump writer
    pub dump_delay: u32,

    pub pcm_file: Option<PathBuf>,
    pub wav_file: Option<PathBuf>,
    pub signal_generator_frequency: i64,
    pub audio_device: i32,

    pub receiver_mode: ReceiverModeType,
    /// Persisted receiver options, keyed by mode name then option name, holding labels
    pub receiver_options: BTreeMap<String, BTreeMap<String, String>>,
    /// Receiver options given on the command line, applied after the persisted ones
    pub receiver_option_overrides: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_type: SourceType::AudioDevice,
            original_source_type: SourceType::AudioDevice,
            sample_shape: SampleShape::Real,
            input_sample_rate: 48_000,
            output_sample_rate: 48_000,
            frequency: 17_200,
            shift: 0,
            device: DeviceConfig::default(),
            input_filter_width: 0,
            preamp: 0,
            decimator_gain: 0,
            decimator_agc_level: 500,
            decimator_cutoff: 20_000,
            fir_filter_size: 51,
            rf_gain: 0,
            rf_gain_enabled: true,
            rf_agc_level: 500,
            remote: RemoteConfig::default(),
            dump_rf: false,
            dump_audio: false,
            dump_format: DumpFormat::Wav,
            dump_suffix: None,
            dump_dir: PathBuf::from("."),
            dump_delay: 0,
            pcm_file: None,
            wav_file: None,
            signal_generator_frequency: -1,
            audio_device: -1,
            receiver_mode: ReceiverModeType::Cw,
            receiver_options: BTreeMap::new(),
            receiver_option_overrides: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Persisted options for a receiver mode.
    pub fn receiver_options_for(&self, mode: &str) -> BTreeMap<String, String> {
        self.receiver_options.get(mode).cloned().unwrap_or_default()
    }

    pub fn set_receiver_options_for(&mut self, mode: &str, options: BTreeMap<String, String>) {
        self.receiver_options.insert(mode.to_string(), options);
    }

    /// Check that the settings needed by the selected source and role are present.
    pub fn validate(&self) -> Result<(), String> {
        match self.remote.role {
            RemoteRole::Client => {
                if self.remote.server.is_empty() {
                    return Err("remote client needs the address of the remote head".into());
                }
                if self.remote.data_port == 0 || self.remote.command_port == 0 {
                    return Err("remote client needs data and command ports".into());
                }
                return Ok(());
            }
            RemoteRole::Server => {
                if self.remote.data_port == 0 || self.remote.command_port == 0 {
                    return Err("remote head server needs data and command ports".into());
                }
            }
            RemoteRole::Local => {}
        }

        match self.source_type {
            SourceType::None => Err("no input source selected".into()),
            SourceType::AudioDevice if self.audio_device < 0 => {
                Err("no input audio device selected".into())
            }
            SourceType::SignalGenerator if self.signal_generator_frequency < 0 => {
                Err("no signal generator frequency selected".into())
            }
            SourceType::PcmFile if self.pcm_file.is_none() => Err("no pcm input file selected".into()),
            SourceType::WavFile if self.wav_file.is_none() => Err("no wav input file selected".into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_sources() {
        assert!(SourceType::AudioDevice.is_local());
        assert!(SourceType::Silence.is_local());
        assert!(!SourceType::PcmFile.is_local());
        assert!(!SourceType::RtlSdr.is_local());
        assert!(!SourceType::Network.is_local());
    }

    #[test]
    fn test_complex_shapes() {
        assert!(SampleShape::Iq.is_complex());
        assert!(SampleShape::Q.is_complex());
        assert!(!SampleShape::Real.is_complex());
    }

    #[test]
    fn test_validate_requires_source_settings() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.audio_device = 1;
        assert!(config.validate().is_ok());

        config.source_type = SourceType::PcmFile;
        assert!(config.validate().is_err());
        config.pcm_file = Some(PathBuf::from("input.pcm"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_remote_client() {
        let mut config = Config::default();
        config.remote.role = RemoteRole::Client;
        assert!(config.validate().is_err());

        config.remote.server = "10.0.0.2".into();
        config.remote.data_port = 5000;
        config.remote.command_port = 5001;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_receiver_options_roundtrip_through_json() {
        let mut config = Config::default();
        let mut options = BTreeMap::new();
        options.insert("humfilter".to_string(), "60Hz".to_string());
        config.set_receiver_options_for("CW", options.clone());

        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.receiver_options_for("CW"), options);
        assert!(restored.receiver_options_for("AM").is_empty());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let restored: Config = serde_json::from_str(r#"{ "frequency": 20900 }"#).unwrap();
        assert_eq!(restored.frequency, 20_900);
        assert_eq!(restored.output_sample_rate, 48_000);
    }
}

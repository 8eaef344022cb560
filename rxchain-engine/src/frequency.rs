use log::debug;
use rxchain_messages::{Config, SourceType};

/// Requested frequency and what it maps to on the hardware and at the IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrequencyTriple {
    pub virtual_frequency: i64,
    pub hardware_frequency: i64,
    pub if_frequency: i64,
}

impl FrequencyTriple {
    /// Map a requested frequency onto the hardware and IF.
    ///
    /// Strictly local sources never have shift, offset or adjustment, so all
    /// three are equal. Samples from a downconverting tuner arrive at
    /// baseband (IF 0), tuned with the configured offset away from the
    /// requested frequency. Everything else is tuned at the requested
    /// frequency plus shift and keeps the signal at its own frequency.
    pub fn compute(config: &Config, frequency: i64) -> Self {
        let triple = if config.source_type.is_local() {
            Self {
                virtual_frequency: frequency,
                hardware_frequency: frequency,
                if_frequency: frequency,
            }
        } else if config.original_source_type == SourceType::RtlSdr {
            Self {
                virtual_frequency: frequency,
                hardware_frequency: frequency + config.shift - config.device.offset
                    + config.device.adjust,
                if_frequency: 0,
            }
        } else {
            Self {
                virtual_frequency: frequency,
                hardware_frequency: frequency + config.shift,
                if_frequency: frequency,
            }
        };
        debug!(
            "Frequencies: virtual {} hardware {} IF {}",
            triple.virtual_frequency, triple.hardware_frequency, triple.if_frequency
        );
        triple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(source: SourceType, original: SourceType) -> Config {
        let mut config = Config {
            source_type: source,
            original_source_type: original,
            shift: 100,
            ..Config::default()
        };
        config.device.offset = 6000;
        config.device.adjust = -25;
        config
    }

    #[test]
    fn test_local_sources_have_equal_frequencies() {
        for source in [
            SourceType::None,
            SourceType::AudioDevice,
            SourceType::SignalGenerator,
            SourceType::Silence,
        ] {
            let triple = FrequencyTriple::compute(&config(source, SourceType::RtlSdr), 17_200);
            assert_eq!(triple.hardware_frequency, 17_200);
            assert_eq!(triple.if_frequency, 17_200);
        }
    }

    #[test]
    fn test_downconverting_tuner_invariant() {
        let config = config(SourceType::RtlSdr, SourceType::RtlSdr);
        for frequency in [0, 17_200, 77_500, 7_040_000] {
            let triple = FrequencyTriple::compute(&config, frequency);
            assert_eq!(triple.if_frequency, 0);
            assert_eq!(
                triple.hardware_frequency - config.device.adjust + config.device.offset
                    - config.shift,
                frequency
            );
        }
    }

    #[test]
    fn test_replay_of_tuner_recording_is_treated_as_tuner() {
        let triple =
            FrequencyTriple::compute(&config(SourceType::WavFile, SourceType::RtlSdr), 77_500);
        assert_eq!(triple.hardware_frequency, 77_500 + 100 - 6000 - 25);
        assert_eq!(triple.if_frequency, 0);
    }

    #[test]
    fn test_translating_source() {
        let triple =
            FrequencyTriple::compute(&config(SourceType::PcmFile, SourceType::AudioDevice), 17_200);
        assert_eq!(triple.hardware_frequency, 17_300);
        assert_eq!(triple.if_frequency, 17_200);
    }
}

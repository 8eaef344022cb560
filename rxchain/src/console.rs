//! Line based console: one letter commands on stdin, events on stdout.

use rxchain_messages::{Command, Event};

pub const HELP: &str = "\
f <hz>             tune
g <gain>           receiver gain, 0 for AGC, negative attenuates
a <gain>           demodulator gain (1-100)
p <level>          preamp level (-2..2)
w <hz>             input filter width, 0 for default
d rf|audio on|off  dump RF input or audio output
o <name>=<value>   receiver option
s                  show spectrum peaks
q                  quit";

fn number<T: std::str::FromStr>(arg: Option<&str>) -> Result<T, String> {
    arg.ok_or("missing value")?
        .parse()
        .map_err(|_| "not a number".to_string())
}

/// Parse a console line. Empty lines give `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(letter) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let command = match letter {
        "f" => Command::SetFrequency(number(arg)?),
        "g" => Command::SetRfGain(number(arg)?),
        "a" => Command::SetDemodulatorGain(number(arg)?),
        "p" => Command::SetPreamp(number(arg)?),
        "w" => Command::SetFilterWidth(number(arg)?),
        "d" => {
            let enabled = match words.next() {
                Some("on") => true,
                Some("off") => false,
                _ => return Err("expected on or off".into()),
            };
            match arg {
                Some("rf") => Command::SetDumpRf(enabled),
                Some("audio") => Command::SetDumpAudio(enabled),
                _ => return Err("expected rf or audio".into()),
            }
        }
        "o" => {
            let (name, value) = arg
                .and_then(|a| a.split_once('='))
                .ok_or("expected name=value")?;
            Command::SetOption {
                name: name.to_string(),
                value: value.to_string(),
            }
        }
        "s" => Command::QuerySpectrum,
        "q" => Command::Stop,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Index and magnitude of the strongest bin.
fn peak(magnitudes: &[f32]) -> Option<(usize, f32)> {
    magnitudes
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Printable form of an event.
pub fn describe(event: &Event) -> String {
    match event {
        Event::StateSnapshot(state) => format!(
            "{} Hz (hardware {} Hz, IF {} Hz) at {} samples/s, gain {}, preamp {}, filter {} Hz, dump rf {} audio {}{}",
            state.virtual_frequency,
            state.hardware_frequency,
            state.if_frequency,
            state.sample_rate,
            state.rf_gain,
            state.preamp,
            state.filter_width,
            state.dump_rf,
            state.dump_audio,
            state
                .mode
                .as_ref()
                .map(|m| format!(", mode {}", m))
                .unwrap_or_default()
        ),
        Event::Spectrum {
            rf,
            audio,
            generation,
        } => {
            let show = |name: &str, bins: &[f32]| match peak(bins) {
                Some((bin, level)) => format!("{} peak bin {}/{} level {:.1}", name, bin, bins.len(), level),
                None => format!("{} empty", name),
            };
            format!("#{} {}, {}", generation, show("rf", rf), show("audio", audio))
        }
        Event::CommandFailed(reason) => format!("failed: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("f 20900"), Ok(Some(Command::SetFrequency(20_900))));
        assert_eq!(parse("g -3"), Ok(Some(Command::SetRfGain(-3))));
        assert_eq!(parse("a 20"), Ok(Some(Command::SetDemodulatorGain(20))));
        assert_eq!(parse("  w 0 "), Ok(Some(Command::SetFilterWidth(0))));
        assert_eq!(parse("d rf on"), Ok(Some(Command::SetDumpRf(true))));
        assert_eq!(parse("d audio off"), Ok(Some(Command::SetDumpAudio(false))));
        assert_eq!(
            parse("o bandwidth=60Hz"),
            Ok(Some(Command::SetOption {
                name: "bandwidth".into(),
                value: "60Hz".into()
            }))
        );
        assert_eq!(parse("q"), Ok(Some(Command::Stop)));
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("f").is_err());
        assert!(parse("f abc").is_err());
        assert!(parse("w -5").is_err());
        assert!(parse("d rf maybe").is_err());
        assert!(parse("o bandwidth").is_err());
        assert!(parse("x").is_err());
    }

    #[test]
    fn test_describe_spectrum_peak() {
        let text = describe(&Event::Spectrum {
            rf: vec![0.0, 3.0, 1.0],
            audio: Vec::new(),
            generation: 7,
        });
        assert_eq!(text, "#7 rf peak bin 1/3 level 3.0, audio empty");
    }
}

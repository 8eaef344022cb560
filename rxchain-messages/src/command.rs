/// Commands sent from the front end to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Stop the engine and halt the input pipeline.
    Stop,
    /// Tune to a new virtual frequency.
    SetFrequency(i64),
    /// Set the receiver gain. 0 hands control to the AGC, negative values attenuate.
    SetRfGain(i32),
    /// Set the demodulator's own gain stage.
    SetDemodulatorGain(i32),
    /// Set the preamp level (-2..=2).
    SetPreamp(i32),
    /// Set the input filter width. 0 selects the default low-pass.
    SetFilterWidth(u32),
    /// Open or close the RF dump gate.
    SetDumpRf(bool),
    /// Open or close the audio dump gate.
    SetDumpAudio(bool),
    /// Set a receiver option by label.
    SetOption { name: String, value: String },
    /// Ask for the current RF and audio spectrum.
    QuerySpectrum,
}

/// Class of a device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CommandClass {
    Tuner = 1,
}

/// Operation within a command class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    SetFrequency = 1,
}

/// A `(class, opcode, value)` triple carried on the command channel of a
/// sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    pub class: CommandClass,
    pub opcode: Opcode,
    pub value: i64,
}

impl DeviceCommand {
    /// Retune the hardware tuner to `frequency`.
    pub const fn set_frequency(frequency: i64) -> Self {
        Self {
            class: CommandClass::Tuner,
            opcode: Opcode::SetFrequency,
            value: frequency,
        }
    }
}

impl TryFrom<i32> for CommandClass {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(CommandClass::Tuner),
            other => Err(other),
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Opcode::SetFrequency),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_frequency_triple() {
        let cmd = DeviceCommand::set_frequency(7_020_000);
        assert_eq!(cmd.class, CommandClass::Tuner);
        assert_eq!(cmd.opcode, Opcode::SetFrequency);
        assert_eq!(cmd.value, 7_020_000);
    }

    #[test]
    fn test_raw_codes() {
        assert_eq!(CommandClass::try_from(CommandClass::Tuner as i32), Ok(CommandClass::Tuner));
        assert_eq!(Opcode::try_from(1), Ok(Opcode::SetFrequency));
        assert_eq!(Opcode::try_from(9), Err(9));
    }
}

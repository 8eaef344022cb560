/// Snapshot of the tunable state of a running receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverState {
    /// Frequency requested by the user
    pub virtual_frequency: i64,
    /// Frequency the hardware is tuned to
    pub hardware_frequency: i64,
    /// Intermediate frequency seen by the demodulator
    pub if_frequency: i64,
    /// Output sample rate of the input pipeline
    pub sample_rate: u32,
    pub rf_gain: i32,
    pub preamp: i32,
    pub filter_width: u32,
    pub dump_rf: bool,
    pub dump_audio: bool,
    /// Receiver mode name, `None` when running as a remote head server
    pub mode: Option<String>,
}

/// Events sent from the engine to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Sent once the pipeline runs, and after every successful command.
    StateSnapshot(ReceiverState),
    /// Magnitudes of the RF and audio spectrum, with the RF generation counter.
    Spectrum {
        rf: Vec<f32>,
        audio: Vec<f32>,
        generation: u64,
    },
    /// A command was rejected. The engine keeps running.
    CommandFailed(String),
}

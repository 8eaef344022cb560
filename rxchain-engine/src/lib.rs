//! Receive chain engine: builds the sample path from a source through
//! decimation, input filtering and a demodulator, and drives it on a
//! background thread.

pub mod cw;
pub mod decimation;
pub mod device;
pub mod dsp;
mod engine;
mod error;
pub mod frequency;
pub mod input;
pub mod network;
pub mod processor;
pub mod receiver;
pub mod spectrum;

pub use engine::Engine;
pub use error::{Error, Result};
pub use frequency::FrequencyTriple;
pub use input::InputPipeline;
pub use receiver::{Demodulator, Receiver, ReceiverMode};

/// Values per block pushed through the chain.
pub const BLOCK_SIZE: usize = 1024;

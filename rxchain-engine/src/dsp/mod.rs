//! Block based signal processing toolkit.
//!
//! Samples are `f32` values on the signed 16-bit scale. Complex streams are
//! carried as interleaved I/Q pairs in the same blocks.
//!
//! A source is a [`Reader`] that is pulled one block at a time. Everything
//! downstream is a [`Stage`] inside a [`Chain`], and each block is pushed
//! synchronously through every branch before the next read.

mod chain;
mod control;
pub mod decimate;
pub mod design;
mod fft;
pub mod filter;
pub mod flow;
pub mod gain;
pub mod io;
pub mod mixer;

pub use chain::{Chain, StageId};
pub use control::{AgcControl, Level, Setting, Switch};
pub use fft::FftTap;

use crate::Result;
use rxchain_messages::DeviceCommand;

/// What a stage wants done with the block it just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand the block on to the downstream branches.
    Forward,
    /// Silently drop the block.
    Drop,
}

/// A push stage, processing a block in place.
pub trait Stage: Send {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow>;

    /// Write out anything buffered. Called when a run ends.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        (**self).process(block)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// A pull source of samples.
pub trait Reader: Send {
    /// Fill `buf` with samples and return how many were written. `0` marks
    /// the end of the stream.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;

    /// Handle a device command. Sources without a tuner ignore it.
    fn command(&mut self, _command: &DeviceCommand) -> Result<()> {
        Ok(())
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        (**self).read(buf)
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        (**self).command(command)
    }
}

/// Read from `reader` until `buf` is full or the stream ends.
pub fn read_full<R: Reader + ?Sized>(reader: &mut R, buf: &mut [f32]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

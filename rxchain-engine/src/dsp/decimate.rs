//! Reader adapters that process or decimate a source as it is pulled.

use super::filter::{FirState, deinterleave, interleave};
use super::{Reader, Stage, read_full};
use crate::Result;
use rxchain_messages::DeviceCommand;

/// Runs a stage over every block read from the inner reader.
pub struct StageReader<R> {
    reader: R,
    stage: Box<dyn Stage>,
}

impl<R: Reader> StageReader<R> {
    pub fn new(reader: R, stage: impl Stage + 'static) -> Self {
        Self {
            reader,
            stage: Box::new(stage),
        }
    }
}

impl<R: Reader> Reader for StageReader<R> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.stage.process(&mut buf[..n])?;
        }
        Ok(n)
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        self.reader.command(command)
    }
}

/// Low-pass filter then keep every `factor`th real sample.
pub struct FirDecimator<R> {
    reader: R,
    factor: usize,
    fir: FirState,
    scratch: Vec<f32>,
}

impl<R: Reader> FirDecimator<R> {
    pub fn new(reader: R, factor: usize, taps: Vec<f32>) -> Self {
        Self {
            reader,
            factor: factor.max(1),
            fir: FirState::new(taps),
            scratch: Vec::new(),
        }
    }
}

impl<R: Reader> Reader for FirDecimator<R> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        self.scratch.resize(buf.len() * self.factor, 0.0);
        let n = read_full(&mut self.reader, &mut self.scratch)?;
        let input = &mut self.scratch[..n];
        self.fir.filter(input);

        let mut out = 0;
        for v in input.iter().step_by(self.factor) {
            buf[out] = *v;
            out += 1;
        }
        Ok(out)
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        self.reader.command(command)
    }
}

/// Low-pass filter then keep every `factor`th I/Q pair.
pub struct IqFirDecimator<R> {
    reader: R,
    factor: usize,
    i: FirState,
    q: FirState,
    scratch: Vec<f32>,
}

impl<R: Reader> IqFirDecimator<R> {
    pub fn new(reader: R, factor: usize, taps: Vec<f32>) -> Self {
        Self {
            reader,
            factor: factor.max(1),
            i: FirState::new(taps.clone()),
            q: FirState::new(taps),
            scratch: Vec::new(),
        }
    }
}

impl<R: Reader> Reader for IqFirDecimator<R> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let pairs = buf.len() / 2;
        self.scratch.resize(pairs * 2 * self.factor, 0.0);
        let n = read_full(&mut self.reader, &mut self.scratch)?;

        let (mut i, mut q) = deinterleave(&self.scratch[..n]);
        self.i.filter(&mut i);
        self.q.filter(&mut q);

        let i: Vec<f32> = i.into_iter().step_by(self.factor).collect();
        let q: Vec<f32> = q.into_iter().step_by(self.factor).collect();
        interleave(&i, &q, buf);
        Ok(i.len() * 2)
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        self.reader.command(command)
    }
}

/// Keep every `factor`th value (or I/Q pair) without filtering.
pub struct Decimator<R> {
    reader: R,
    factor: usize,
    width: usize,
    scratch: Vec<f32>,
}

impl<R: Reader> Decimator<R> {
    pub fn real(reader: R, factor: usize) -> Self {
        Self::new(reader, factor, 1)
    }

    pub fn iq(reader: R, factor: usize) -> Self {
        Self::new(reader, factor, 2)
    }

    fn new(reader: R, factor: usize, width: usize) -> Self {
        Self {
            reader,
            factor: factor.max(1),
            width,
            scratch: Vec::new(),
        }
    }
}

impl<R: Reader> Reader for Decimator<R> {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let frames = buf.len() / self.width;
        self.scratch.resize(frames * self.width * self.factor, 0.0);
        let n = read_full(&mut self.reader, &mut self.scratch)?;

        let mut out = 0;
        for frame in self.scratch[..n]
            .chunks_exact(self.width)
            .step_by(self.factor)
        {
            buf[out..out + self.width].copy_from_slice(frame);
            out += self.width;
        }
        Ok(out)
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        self.reader.command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::gain::Gain;

    struct Ramp {
        next: f32,
        end: f32,
    }

    impl Reader for Ramp {
        fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
            let mut n = 0;
            for v in buf.iter_mut() {
                if self.next >= self.end {
                    break;
                }
                *v = self.next;
                self.next += 1.0;
                n += 1;
            }
            Ok(n)
        }
    }

    fn ramp(len: usize) -> Ramp {
        Ramp {
            next: 0.0,
            end: len as f32,
        }
    }

    #[test]
    fn test_stage_reader_applies_stage() {
        let (gain, _) = Gain::new(2.0);
        let mut reader = StageReader::new(ramp(4), gain);
        let mut buf = vec![0.0; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_real_decimator_keeps_every_nth() {
        let mut reader = Decimator::real(ramp(12), 3);
        let mut buf = vec![0.0; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, vec![0.0, 3.0, 6.0, 9.0]);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_iq_decimator_keeps_pairs() {
        let mut reader = Decimator::iq(ramp(12), 3);
        let mut buf = vec![0.0; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, vec![0.0, 1.0, 6.0, 7.0]);
    }

    #[test]
    fn test_fir_decimator_with_identity_taps() {
        let mut reader = FirDecimator::new(ramp(10), 2, vec![1.0]);
        let mut buf = vec![0.0; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, vec![0.0, 2.0, 4.0, 6.0]);
        // Short tail at the end of the stream
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 8.0);
    }

    #[test]
    fn test_iq_fir_decimator_with_identity_taps() {
        let mut reader = IqFirDecimator::new(ramp(16), 2, vec![1.0]);
        let mut buf = vec![0.0; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 8);
        assert_eq!(buf, vec![0.0, 1.0, 4.0, 5.0, 8.0, 9.0, 12.0, 13.0]);
    }
}

//! Sample sources and sinks: generators, PCM and WAV files.

use super::{Flow, Reader, Stage};
use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use rxchain_messages::DumpFormat;
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Holds a generated stream to the pace of a real device.
#[derive(Debug)]
struct Pace {
    rate: f64,
    started: Option<Instant>,
    produced: u64,
}

impl Pace {
    fn new(rate: u32, channels: usize) -> Self {
        Self {
            rate: (rate as usize * channels) as f64,
            started: None,
            produced: 0,
        }
    }

    fn wait(&mut self, values: usize) {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.produced += values as u64;
        let due = started + Duration::from_secs_f64(self.produced as f64 / self.rate);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

/// Sine tone source.
pub struct ToneGenerator {
    step: f64,
    phase: f64,
    amplitude: f32,
    pace: Option<Pace>,
}

impl ToneGenerator {
    pub fn new(rate: u32, frequency: f64, amplitude: f32) -> Self {
        Self {
            step: TAU * frequency / rate as f64,
            phase: 0.0,
            amplitude,
            pace: Some(Pace::new(rate, 1)),
        }
    }

    /// Produce samples as fast as they are read.
    pub fn unpaced(mut self) -> Self {
        self.pace = None;
        self
    }
}

impl Reader for ToneGenerator {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        if let Some(pace) = self.pace.as_mut() {
            pace.wait(buf.len());
        }
        for v in buf.iter_mut() {
            *v = self.amplitude * self.phase.sin() as f32;
            self.phase = (self.phase + self.step) % TAU;
        }
        Ok(buf.len())
    }
}

/// Endless silence.
pub struct Silence {
    pace: Option<Pace>,
}

impl Silence {
    pub fn new(rate: u32, channels: usize) -> Self {
        Self {
            pace: Some(Pace::new(rate, channels)),
        }
    }

    pub fn unpaced(mut self) -> Self {
        self.pace = None;
        self
    }
}

impl Reader for Silence {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        if let Some(pace) = self.pace.as_mut() {
            pace.wait(buf.len());
        }
        buf.fill(0.0);
        Ok(buf.len())
    }
}

/// Raw signed 16-bit little endian samples from a file.
pub struct PcmReader {
    file: BufReader<File>,
}

impl PcmReader {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening pcm file {}", path.display());
        Ok(Self {
            file: BufReader::new(File::open(path)?),
        })
    }
}

impl Reader for PcmReader {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        for (n, v) in buf.iter_mut().enumerate() {
            match self.file.read_i16::<LittleEndian>() {
                Ok(sample) => *v = sample as f32,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(n),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf.len())
    }
}

/// 16-bit WAV file source. Channels stay interleaved.
pub struct WavReader {
    reader: hound::WavReader<BufReader<File>>,
}

impl WavReader {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        info!(
            "Opening wav file {} ({} Hz, {} channels)",
            path.display(),
            spec.sample_rate,
            spec.channels
        );
        Ok(Self { reader })
    }

    pub fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }
}

impl Reader for WavReader {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let mut samples = self.reader.samples::<i16>();
        for (n, v) in buf.iter_mut().enumerate() {
            match samples.next() {
                Some(sample) => *v = sample? as f32,
                None => return Ok(n),
            }
        }
        Ok(buf.len())
    }
}

fn to_i16(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Raw signed 16-bit little endian file sink.
pub struct PcmWriter {
    file: BufWriter<File>,
}

impl PcmWriter {
    pub fn create(path: &Path) -> Result<Self> {
        debug!("Creating pcm file {}", path.display());
        Ok(Self {
            file: BufWriter::new(File::create(path)?),
        })
    }
}

impl Stage for PcmWriter {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        for v in block.iter() {
            self.file.write_i16::<LittleEndian>(to_i16(*v))?;
        }
        Ok(Flow::Forward)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// 16-bit WAV file sink.
pub struct WavWriter {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl WavWriter {
    pub fn create(path: &Path, rate: u32, channels: u16) -> Result<Self> {
        debug!("Creating wav file {}", path.display());
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        Ok(Self {
            writer: hound::WavWriter::create(path, spec)?,
        })
    }
}

impl Stage for WavWriter {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        for v in block.iter() {
            self.writer.write_sample(to_i16(*v))?;
        }
        Ok(Flow::Forward)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Dump file name: `<prefix>_<suffix>.<ext>`, the suffix defaulting to the
/// current unix time.
pub fn dump_path(dir: &Path, prefix: &str, suffix: Option<&str>, format: DumpFormat) -> PathBuf {
    let suffix = match suffix {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => chrono::Utc::now().timestamp().to_string(),
    };
    dir.join(format!("{}_{}.{}", prefix, suffix, format.extension()))
}

/// Dump file sink, created when the first block arrives.
pub struct DumpWriter {
    path: PathBuf,
    format: DumpFormat,
    rate: u32,
    channels: u16,
    sink: Option<Box<dyn Stage>>,
}

impl DumpWriter {
    pub fn new(path: PathBuf, format: DumpFormat, rate: u32, channels: u16) -> Self {
        Self {
            path,
            format,
            rate,
            channels,
            sink: None,
        }
    }

    fn open(&self) -> Result<Box<dyn Stage>> {
        info!("Dumping samples to {}", self.path.display());
        Ok(match self.format {
            DumpFormat::Pcm => Box::new(PcmWriter::create(&self.path)?),
            DumpFormat::Wav => Box::new(WavWriter::create(&self.path, self.rate, self.channels)?),
        })
    }
}

impl Stage for DumpWriter {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if self.sink.is_none() {
            self.sink = Some(self.open()?);
        }
        match self.sink.as_mut() {
            Some(sink) => sink.process(block),
            None => Ok(Flow::Forward),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::read_full;

    #[test]
    fn test_pcm_file_roundtrip_with_short_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.pcm");

        let mut writer = PcmWriter::create(&path).unwrap();
        let mut block: Vec<f32> = (0..10).map(|v| (v * 100 - 300) as f32).collect();
        writer.process(&mut block).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut reader = PcmReader::open(&path).unwrap();
        let mut buf = vec![0.0; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 8);
        assert_eq!(&buf[..], &block[..8]);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_wav_writer_clamps_to_16_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.wav");

        let mut writer = WavWriter::create(&path, 8_000, 1).unwrap();
        writer.process(&mut [40_000.0, -40_000.0, 12.4]).unwrap();
        drop(writer);

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.sample_rate(), 8_000);
        let mut buf = vec![0.0; 4];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[32767.0, -32768.0, 12.0]);
    }

    #[test]
    fn test_dump_path_uses_suffix() {
        let path = dump_path(Path::new("/tmp"), "INPUT", Some("run1"), DumpFormat::Pcm);
        assert_eq!(path, PathBuf::from("/tmp/INPUT_run1.pcm"));

        let path = dump_path(Path::new("."), "AUDIO", None, DumpFormat::Wav);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("AUDIO_") && name.ends_with(".wav"));
    }

    #[test]
    fn test_dump_writer_creates_file_on_first_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INPUT_test.pcm");
        let mut writer = DumpWriter::new(path.clone(), DumpFormat::Pcm, 48_000, 1);

        writer.flush().unwrap();
        assert!(!path.exists());

        writer.process(&mut [1.0, 2.0]).unwrap();
        writer.flush().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_unpaced_tone_fills_buffer() {
        let mut tone = ToneGenerator::new(48_000, 1_000.0, 100.0).unpaced();
        let mut buf = vec![0.0; 48];
        assert_eq!(tone.read(&mut buf).unwrap(), 48);
        assert_eq!(buf[0], 0.0);
        assert!((buf[12] - 100.0).abs() < 1e-3);
    }
}

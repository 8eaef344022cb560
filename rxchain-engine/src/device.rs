//! Hardware sources, driven through their command line capture tools.

use crate::dsp::Reader;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info, warn};
use rxchain_messages::{CommandClass, DeviceCommand, Opcode, SampleShape};
use std::io::{BufReader, ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

/// What the tuner delivers per I/Q pair it captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerMode {
    Iq,
    /// Inphase only, quadrature zeroed
    I,
    /// Quadrature only, inphase zeroed
    Q,
    /// Real part of the captured signal, one value per pair
    Real,
}

impl From<SampleShape> for TunerMode {
    fn from(shape: SampleShape) -> Self {
        match shape {
            SampleShape::Iq => TunerMode::Iq,
            SampleShape::I => TunerMode::I,
            SampleShape::Q => TunerMode::Q,
            SampleShape::Real => TunerMode::Real,
        }
    }
}

/// Settings for opening a hardware tuner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerSettings {
    pub index: i32,
    pub sample_rate: u32,
    pub frequency: i64,
    /// Tenths of a dB, 0 for automatic
    pub gain: i32,
    /// Frequency correction in ppm
    pub correction: i64,
    pub mode: TunerMode,
}

/// Opens sound cards and tuners.
pub trait DeviceDrivers: Send {
    /// Signed 16-bit mono capture from a sound card.
    fn open_audio(&self, device: i32, sample_rate: u32) -> Result<Box<dyn Reader>>;

    /// I/Q capture from a downconverting tuner. The reader retunes on
    /// tuner commands.
    fn open_tuner(&self, settings: &TunerSettings) -> Result<Box<dyn Reader>>;
}

/// Drivers running `rtl_sdr` and `arecord` as child processes.
#[derive(Debug, Clone)]
pub struct ProcessDrivers {
    pub rtl_sdr: String,
    pub arecord: String,
}

impl Default for ProcessDrivers {
    fn default() -> Self {
        Self {
            rtl_sdr: "rtl_sdr".to_string(),
            arecord: "arecord".to_string(),
        }
    }
}

impl DeviceDrivers for ProcessDrivers {
    fn open_audio(&self, device: i32, sample_rate: u32) -> Result<Box<dyn Reader>> {
        let mut cmd = Command::new(&self.arecord);
        cmd.arg("-q")
            .arg("-D")
            .arg(format!("plughw:{}", device))
            .arg("-f")
            .arg("S16_LE")
            .arg("-r")
            .arg(sample_rate.to_string())
            .arg("-c")
            .arg("1")
            .arg("-t")
            .arg("raw");
        Ok(Box::new(AudioCapture {
            capture: Capture::spawn(cmd)?,
        }))
    }

    fn open_tuner(&self, settings: &TunerSettings) -> Result<Box<dyn Reader>> {
        let capture = Capture::spawn(rtl_sdr_command(&self.rtl_sdr, settings))?;
        Ok(Box::new(TunerCapture {
            program: self.rtl_sdr.clone(),
            settings: settings.clone(),
            capture,
            bytes: Vec::new(),
        }))
    }
}

fn rtl_sdr_command(program: &str, settings: &TunerSettings) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("-d")
        .arg(settings.index.to_string())
        .arg("-f")
        .arg(settings.frequency.to_string())
        .arg("-s")
        .arg(settings.sample_rate.to_string());
    if settings.gain != 0 {
        cmd.arg("-g").arg((settings.gain as f32 / 10.0).to_string());
    }
    if settings.correction != 0 {
        cmd.arg("-p").arg(settings.correction.to_string());
    }
    cmd.arg("-");
    cmd
}

/// A capture tool writing raw samples to its stdout.
struct Capture {
    child: Child,
    stdout: BufReader<ChildStdout>,
    running: bool,
}

impl Capture {
    fn spawn(mut cmd: Command) -> Result<Self> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        info!("Executing: {:?}", cmd);
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Device(format!("failed to start {:?}: {}", cmd.get_program(), e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Device("capture tool has no stdout".into()))?;
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            running: true,
        })
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        debug!("Stopping capture process {}", self.child.id());
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop capture process: {}", e);
        }
        let _ = self.child.wait();
        self.running = false;
    }

    /// Read until `buf` is full or the tool exits.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AudioCapture {
    capture: Capture,
}

impl Reader for AudioCapture {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        for (n, v) in buf.iter_mut().enumerate() {
            match self.capture.stdout.read_i16::<LittleEndian>() {
                Ok(sample) => *v = sample as f32,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(n),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf.len())
    }
}

struct TunerCapture {
    program: String,
    settings: TunerSettings,
    capture: Capture,
    bytes: Vec<u8>,
}

/// Unsigned 8-bit tuner sample on the signed 16-bit scale.
fn widen(byte: u8) -> f32 {
    (byte as f32 - 127.5) * 256.0
}

/// Convert unsigned 8-bit I/Q pairs into block values for a tuner mode.
fn convert(mode: TunerMode, bytes: &[u8], buf: &mut [f32]) -> usize {
    let pairs = bytes.chunks_exact(2);
    match mode {
        TunerMode::Real => {
            let mut n = 0;
            for (v, pair) in buf.iter_mut().zip(pairs) {
                *v = widen(pair[0]);
                n += 1;
            }
            n
        }
        _ => {
            let mut n = 0;
            for (out, pair) in buf.chunks_exact_mut(2).zip(pairs) {
                let (i, q) = (widen(pair[0]), widen(pair[1]));
                (out[0], out[1]) = match mode {
                    TunerMode::I => (i, 0.0),
                    TunerMode::Q => (0.0, q),
                    _ => (i, q),
                };
                n += 2;
            }
            n
        }
    }
}

impl Reader for TunerCapture {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let pairs = match self.settings.mode {
            TunerMode::Real => buf.len(),
            _ => buf.len() / 2,
        };
        self.bytes.resize(pairs * 2, 0);
        let n = self.capture.fill(&mut self.bytes)?;
        Ok(convert(self.settings.mode, &self.bytes[..n], buf))
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        match (command.class, command.opcode) {
            (CommandClass::Tuner, Opcode::SetFrequency) => {
                if command.value == self.settings.frequency {
                    return Ok(());
                }
                info!("Retuning tuner to {} Hz", command.value);
                self.settings.frequency = command.value;
                // The device must be released before it is opened again
                self.capture.stop();
                self.capture = Capture::spawn(rtl_sdr_command(&self.program, &self.settings))?;
                Ok(())
            }
        }
    }
}

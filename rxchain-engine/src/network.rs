//! Remote head transport.
//!
//! Two TCP connections per peer: a data connection carrying raw samples as
//! little endian `f32` values, and a command connection carrying
//! `(class, opcode, value)` triples as three little endian `i32`s.

use crate::dsp::Reader;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};
use rxchain_messages::{CommandClass, DeviceCommand, Opcode};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const COMMAND_FRAME: usize = 12;
const ACCEPT_POLL: Duration = Duration::from_millis(10);

fn encode_command(command: &DeviceCommand) -> Result<[u8; COMMAND_FRAME]> {
    let value = i32::try_from(command.value)
        .map_err(|_| Error::Device(format!("command value {} does not fit the wire", command.value)))?;
    let mut frame = [0u8; COMMAND_FRAME];
    LittleEndian::write_i32(&mut frame[0..4], command.class as i32);
    LittleEndian::write_i32(&mut frame[4..8], command.opcode as i32);
    LittleEndian::write_i32(&mut frame[8..12], value);
    Ok(frame)
}

fn decode_command(frame: &[u8]) -> Option<DeviceCommand> {
    let class = CommandClass::try_from(LittleEndian::read_i32(&frame[0..4]));
    let opcode = Opcode::try_from(LittleEndian::read_i32(&frame[4..8]));
    let value = LittleEndian::read_i32(&frame[8..12]) as i64;
    match (class, opcode) {
        (Ok(class), Ok(opcode)) => Some(DeviceCommand {
            class,
            opcode,
            value,
        }),
        (class, opcode) => {
            warn!("Ignoring unknown device command {:?}/{:?}", class, opcode);
            None
        }
    }
}

/// Server side of a remote head: publishes samples and receives commands.
pub struct Publisher {
    data_listener: TcpListener,
    command_listener: TcpListener,
    data: Option<BufWriter<TcpStream>>,
    command: Option<TcpStream>,
    pending: Vec<u8>,
}

impl Publisher {
    /// Listen on all interfaces.
    pub fn bind(data_port: u16, command_port: u16) -> Result<Self> {
        Self::bind_on("0.0.0.0", data_port, command_port)
    }

    pub fn bind_on(host: &str, data_port: u16, command_port: u16) -> Result<Self> {
        let data_listener = TcpListener::bind((host, data_port))?;
        let command_listener = TcpListener::bind((host, command_port))?;
        data_listener.set_nonblocking(true)?;
        command_listener.set_nonblocking(true)?;
        info!(
            "Publishing samples on {} with commands on {}",
            data_listener.local_addr()?,
            command_listener.local_addr()?
        );
        Ok(Self {
            data_listener,
            command_listener,
            data: None,
            command: None,
            pending: Vec::new(),
        })
    }

    pub fn data_addr(&self) -> Result<SocketAddr> {
        Ok(self.data_listener.local_addr()?)
    }

    pub fn command_addr(&self) -> Result<SocketAddr> {
        Ok(self.command_listener.local_addr()?)
    }

    /// Wait for a data client, giving up when `terminate` is raised.
    fn connect_data(&mut self, terminate: &AtomicBool) -> Result<bool> {
        while self.data.is_none() {
            if terminate.load(Ordering::Relaxed) {
                return Ok(false);
            }
            match self.data_listener.accept() {
                Ok((stream, peer)) => {
                    info!("Data client connected from {}", peer);
                    stream.set_nonblocking(false)?;
                    stream.set_nodelay(true)?;
                    self.data = Some(BufWriter::new(stream));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    /// Send a block to the data client, waiting for one if none is
    /// connected. Returns `false` when terminated while waiting.
    pub fn publish(&mut self, block: &[f32], terminate: &AtomicBool) -> Result<bool> {
        if !self.connect_data(terminate)? {
            return Ok(false);
        }
        if let Some(stream) = self.data.as_mut() {
            let sent = block
                .iter()
                .try_for_each(|v| stream.write_f32::<LittleEndian>(*v))
                .and_then(|_| stream.flush());
            if let Err(e) = sent {
                warn!("Data client went away: {}", e);
                self.data = None;
            }
        }
        Ok(true)
    }

    /// Commands received since the last poll.
    pub fn poll_commands(&mut self) -> Result<Vec<DeviceCommand>> {
        if self.command.is_none() {
            match self.command_listener.accept() {
                Ok((stream, peer)) => {
                    info!("Command client connected from {}", peer);
                    stream.set_nonblocking(true)?;
                    self.command = Some(stream);
                    self.pending.clear();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }

        let mut closed = false;
        if let Some(stream) = self.command.as_mut() {
            let mut buf = [0u8; 256];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => {
                        closed = true;
                        break;
                    }
                    Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Command client failed: {}", e);
                        closed = true;
                        break;
                    }
                }
            }
        }
        if closed {
            debug!("Command client disconnected");
            self.command = None;
        }

        let complete = self.pending.len() - self.pending.len() % COMMAND_FRAME;
        let commands = self.pending[..complete]
            .chunks_exact(COMMAND_FRAME)
            .filter_map(decode_command)
            .collect();
        self.pending.drain(..complete);
        Ok(commands)
    }
}

/// Client side of a remote head: a reader of the published samples.
pub struct Subscriber {
    data: BufReader<TcpStream>,
    command: TcpStream,
}

impl Subscriber {
    pub fn connect(server: &str, data_port: u16, command_port: u16) -> Result<Self> {
        info!(
            "Connecting to remote head at {} (data {}, commands {})",
            server, data_port, command_port
        );
        let data = TcpStream::connect((server, data_port))?;
        let command = TcpStream::connect((server, command_port))?;
        command.set_nodelay(true)?;
        Ok(Self {
            data: BufReader::new(data),
            command,
        })
    }
}

impl Reader for Subscriber {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        for (n, v) in buf.iter_mut().enumerate() {
            match self.data.read_f32::<LittleEndian>() {
                Ok(sample) => *v = sample,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(n),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf.len())
    }

    fn command(&mut self, command: &DeviceCommand) -> Result<()> {
        debug!("Sending device command {:?}", command);
        self.command.write_all(&encode_command(command)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_command_frame() {
        let command = DeviceCommand::set_frequency(71_600_000);
        let frame = encode_command(&command).unwrap();
        assert_eq!(&frame[0..8], &[1, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(decode_command(&frame), Some(command));

        assert!(encode_command(&DeviceCommand::set_frequency(5_000_000_000)).is_err());

        let mut unknown = frame;
        unknown[0] = 9;
        assert_eq!(decode_command(&unknown), None);
    }

    #[test]
    fn test_publish_and_subscribe() {
        let mut publisher = Publisher::bind_on("127.0.0.1", 0, 0).unwrap();
        let data_port = publisher.data_addr().unwrap().port();
        let command_port = publisher.command_addr().unwrap().port();

        let client = thread::spawn(move || {
            let mut subscriber = Subscriber::connect("127.0.0.1", data_port, command_port).unwrap();
            subscriber
                .command(&DeviceCommand::set_frequency(17_200))
                .unwrap();
            let mut buf = vec![0.0; 4];
            let n = crate::dsp::read_full(&mut subscriber, &mut buf).unwrap();
            (n, buf)
        });

        let terminate = AtomicBool::new(false);
        assert!(publisher.publish(&[1.0, -2.0, 3.5, 4.0], &terminate).unwrap());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut commands = Vec::new();
        while commands.is_empty() && Instant::now() < deadline {
            commands = publisher.poll_commands().unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(commands, vec![DeviceCommand::set_frequency(17_200)]);

        let (n, buf) = client.join().unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, vec![1.0, -2.0, 3.5, 4.0]);
    }

    #[test]
    fn test_publish_gives_up_when_terminated() {
        let mut publisher = Publisher::bind_on("127.0.0.1", 0, 0).unwrap();
        let terminate = AtomicBool::new(true);
        assert!(!publisher.publish(&[0.0; 4], &terminate).unwrap());
    }
}

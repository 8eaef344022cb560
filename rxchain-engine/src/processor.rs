use crate::dsp::{Chain, Reader, StageId};
use crate::network::Publisher;
use crate::{BLOCK_SIZE, Error, Result};
use flume::{Receiver, Sender};
use log::{debug, error, info};
use rxchain_messages::DeviceCommand;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Where the blocks read by a processor go.
pub enum Sink {
    /// Pushed through a local chain, starting at `root`.
    Local { chain: Chain, root: StageId },
    /// Sent to a remote receiver.
    Publish(Publisher),
}

struct Driver {
    reader: Box<dyn Reader>,
    sink: Sink,
}

impl Driver {
    fn apply(&mut self, command: &DeviceCommand) {
        if let Err(e) = self.reader.command(command) {
            error!("Device command {:?} failed: {}", command, e);
        }
    }

    fn drive(
        &mut self,
        blocks: Option<u64>,
        terminate: &AtomicBool,
        commands: &Receiver<DeviceCommand>,
    ) -> Result<()> {
        let mut block = vec![0.0f32; BLOCK_SIZE];
        let mut count = 0u64;
        while !terminate.load(Ordering::Relaxed) {
            if blocks.is_some_and(|limit| count >= limit) {
                debug!("Processed {} blocks", count);
                break;
            }
            for command in commands.try_iter() {
                self.apply(&command);
            }

            let n = self.reader.read(&mut block)?;
            if n == 0 {
                info!("End of input after {} blocks", count);
                break;
            }

            match &mut self.sink {
                Sink::Local { chain, root } => chain.push(*root, &mut block[..n])?,
                Sink::Publish(publisher) => {
                    for command in publisher.poll_commands()? {
                        if let Err(e) = self.reader.command(&command) {
                            error!("Remote device command {:?} failed: {}", command, e);
                        }
                    }
                    if !publisher.publish(&block[..n], terminate)? {
                        break;
                    }
                }
            }
            count += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Local { chain, .. } => chain.flush(),
            Sink::Publish(_) => Ok(()),
        }
    }
}

/// Drives a reader into its sink on a background thread.
///
/// While idle the processor owns the reader and the sink; a run moves them
/// onto the thread and `halt`/`wait` bring them back, so the same pipeline
/// can run again.
pub struct Processor {
    name: String,
    driver: Option<Driver>,
    handle: Option<JoinHandle<(Driver, Result<()>)>>,
    terminate: Arc<AtomicBool>,
    commands_tx: Sender<DeviceCommand>,
    commands_rx: Receiver<DeviceCommand>,
}

impl Processor {
    pub fn new(name: &str, reader: Box<dyn Reader>, sink: Sink) -> Self {
        let (commands_tx, commands_rx) = flume::unbounded();
        Self {
            name: name.to_string(),
            driver: Some(Driver { reader, sink }),
            handle: None,
            terminate: Arc::new(AtomicBool::new(false)),
            commands_tx,
            commands_rx,
        }
    }

    /// Start processing `blocks` blocks, or until the input ends or the
    /// processor is halted.
    pub fn run(&mut self, blocks: Option<u64>) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::Running);
        }
        let mut driver = self.driver.take().ok_or(Error::Running)?;

        info!("Starting {}", self.name);
        self.terminate.store(false, Ordering::Relaxed);
        let terminate = self.terminate.clone();
        let commands = self.commands_rx.clone();

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let result = driver.drive(blocks, &terminate, &commands);
                let flushed = driver.flush();
                (driver, result.and(flushed))
            });
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Raise the termination flag and wait for the run to end.
    pub fn halt(&mut self) -> Result<()> {
        self.terminate.store(true, Ordering::Relaxed);
        self.wait()
    }

    /// Wait for the run to end by itself. Returns the run's result.
    pub fn wait(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok((driver, result)) => {
                info!("Stopped {}", self.name);
                self.driver = Some(driver);
                result
            }
            Err(_) => Err(Error::Device(format!("{} panicked", self.name))),
        }
    }

    /// The local chain, available while idle.
    pub fn chain_mut(&mut self) -> Result<&mut Chain> {
        match self.driver.as_mut() {
            Some(Driver {
                sink: Sink::Local { chain, .. },
                ..
            }) => Ok(chain),
            Some(_) => Err(Error::config("a publishing processor has no local chain")),
            None => Err(Error::Running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// A run was started and has ended without being waited for.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_finished())
    }

    /// Send a command to the reader: directly while idle, between blocks
    /// while running.
    pub fn command(&mut self, command: DeviceCommand) -> Result<()> {
        match self.driver.as_mut() {
            Some(driver) => driver.reader.command(&command),
            None => self
                .commands_tx
                .send(command)
                .map_err(|_| Error::Device(format!("{} is gone", self.name))),
        }
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.halt() {
                error!("{} ended with an error: {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Flow, Stage};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Counting {
        remaining: Option<usize>,
        commands: Arc<Mutex<Vec<DeviceCommand>>>,
    }

    impl Reader for Counting {
        fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return Ok(0);
                }
                *remaining -= 1;
            }
            thread::sleep(Duration::from_millis(1));
            buf.fill(1.0);
            Ok(buf.len())
        }

        fn command(&mut self, command: &DeviceCommand) -> Result<()> {
            self.commands.lock().unwrap().push(*command);
            Ok(())
        }
    }

    struct Tally(Arc<AtomicUsize>, Arc<AtomicBool>);

    impl Stage for Tally {
        fn process(&mut self, _block: &mut [f32]) -> Result<Flow> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Forward)
        }

        fn flush(&mut self) -> Result<()> {
            self.1.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn processor(remaining: Option<usize>) -> (Processor, Arc<AtomicUsize>, Arc<AtomicBool>, Arc<Mutex<Vec<DeviceCommand>>>) {
        let count = Arc::new(AtomicUsize::new(0));
        let flushed = Arc::new(AtomicBool::new(false));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new();
        let root = chain.add("tally", Tally(count.clone(), flushed.clone()));
        let reader = Counting {
            remaining,
            commands: commands.clone(),
        };
        (
            Processor::new("test_processor", Box::new(reader), Sink::Local { chain, root }),
            count,
            flushed,
            commands,
        )
    }

    #[test]
    fn test_run_block_count_and_rerun() {
        let (mut processor, count, flushed, _) = processor(None);
        processor.run(Some(5)).unwrap();
        processor.wait().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert!(flushed.load(Ordering::SeqCst));

        processor.run(Some(3)).unwrap();
        processor.wait().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_end_of_input_ends_run() {
        let (mut processor, count, _, _) = processor(Some(4));
        processor.run(None).unwrap();
        processor.wait().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_second_run_is_rejected() {
        let (mut processor, _, _, _) = processor(None);
        processor.run(None).unwrap();
        assert!(matches!(processor.run(None), Err(Error::Running)));
        processor.halt().unwrap();
        assert!(!processor.is_running());
    }

    #[test]
    fn test_commands_reach_reader_while_running() {
        let (mut processor, _, _, commands) = processor(None);
        processor.command(DeviceCommand::set_frequency(1)).unwrap();
        processor.run(None).unwrap();
        processor.command(DeviceCommand::set_frequency(2)).unwrap();
        thread::sleep(Duration::from_millis(50));
        processor.halt().unwrap();
        assert_eq!(
            *commands.lock().unwrap(),
            vec![
                DeviceCommand::set_frequency(1),
                DeviceCommand::set_frequency(2)
            ]
        );
    }

    #[test]
    fn test_dropping_running_processor_halts() {
        let (mut processor, _, flushed, _) = processor(None);
        processor.run(None).unwrap();
        drop(processor);
        assert!(flushed.load(Ordering::SeqCst));
    }
}

use crate::device::DeviceDrivers;
use crate::input::InputPipeline;
use crate::receiver::{Receiver, ReceiverMode};
use anyhow::Result;
use flume::{Receiver as CommandReceiver, Sender};
use log::{debug, error, info};
use rxchain_messages::{Command, Config, Event, ReceiverState, RemoteRole};
use std::time::Duration;

fn no_receiver() -> String {
    "no receiver on a remote head".to_string()
}

/// The receive engine.
/// Owns the input pipeline and the receiver and processes commands from the front end.
pub struct Engine {
    cmd_rx: CommandReceiver<Command>,
    event_tx: Sender<Event>,
    config: Config,
    input: InputPipeline,
    receiver: Option<Receiver<ReceiverMode>>,
    should_exit: bool,
}

impl Engine {
    /// Build the input pipeline and, unless publishing to a remote
    /// receiver, the receiver for the configured mode.
    pub fn new(
        cmd_rx: CommandReceiver<Command>,
        event_tx: Sender<Event>,
        mut config: Config,
        drivers: &dyn DeviceDrivers,
    ) -> Result<Self> {
        debug!("Constructing a new engine");
        let mut input = InputPipeline::new(&mut config, drivers)?;

        let receiver = if config.remote.role == RemoteRole::Server {
            info!("Running as remote head, no receiver");
            None
        } else {
            let mut receiver = Receiver::new(ReceiverMode::new(config.receiver_mode));
            receiver.build(&mut config, &mut input, None)?;
            if input.frequencies().virtual_frequency != config.frequency {
                input.retune(&config, config.frequency);
            }
            Some(receiver)
        };

        Ok(Self {
            cmd_rx,
            event_tx,
            config,
            input,
            receiver,
            should_exit: false,
        })
    }

    /// Run the engine (blocking) until stopped or the input ends.
    /// Returns the final configuration.
    pub fn run(mut self) -> Result<Config> {
        self.input.run(None)?;
        self.event_tx.send(Event::StateSnapshot(self.state()))?;

        while !self.should_exit {
            self.process_commands();
        }

        info!("Stopping the input pipeline");
        self.input.halt()?;
        Ok(self.config)
    }

    fn state(&self) -> ReceiverState {
        let frequencies = self.input.frequencies();
        ReceiverState {
            virtual_frequency: frequencies.virtual_frequency,
            hardware_frequency: frequencies.hardware_frequency,
            if_frequency: frequencies.if_frequency,
            sample_rate: self.input.output_sample_rate(),
            rf_gain: self.config.rf_gain,
            preamp: self.config.preamp,
            filter_width: self.config.input_filter_width,
            dump_rf: self.config.dump_rf,
            dump_audio: self.config.dump_audio,
            mode: self.receiver.as_ref().map(|r| r.name().to_string()),
        }
    }

    fn emit(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            debug!("Nobody is listening for events");
        }
    }

    fn process_commands(&mut self) {
        loop {
            let msg = self.cmd_rx.recv_timeout(Duration::from_millis(100));
            debug!("Engine received message: {:?}", msg);

            match msg {
                Ok(Command::Stop) | Err(flume::RecvTimeoutError::Disconnected) => {
                    self.should_exit = true;
                    break;
                }
                Ok(Command::QuerySpectrum) => {
                    let (rf, generation) = self.input.spectrum();
                    let audio = self
                        .receiver
                        .as_ref()
                        .map(|r| r.spectrum().0)
                        .unwrap_or_default();
                    self.emit(Event::Spectrum {
                        rf,
                        audio,
                        generation,
                    });
                }
                Ok(command) => match self.apply(command) {
                    Ok(()) => self.emit(Event::StateSnapshot(self.state())),
                    Err(reason) => {
                        error!("{}", reason);
                        self.emit(Event::CommandFailed(reason));
                    }
                },
                Err(flume::RecvTimeoutError::Timeout) => {
                    if self.input.is_finished() {
                        info!("Input has ended");
                        self.should_exit = true;
                        break;
                    }
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> std::result::Result<(), String> {
        match command {
            Command::SetFrequency(frequency) => {
                if let Some(receiver) = self.receiver.as_mut() {
                    receiver
                        .set_frequency(&mut self.config, frequency)
                        .map_err(|e| e.to_string())?;
                } else {
                    self.config.frequency = frequency;
                }
                self.input.retune(&self.config, frequency);
            }
            Command::SetRfGain(gain) => {
                let receiver = self.receiver.as_mut().ok_or_else(no_receiver)?;
                receiver.set_rf_gain(&mut self.config, gain);
            }
            Command::SetDemodulatorGain(gain) => {
                self.receiver
                    .as_mut()
                    .ok_or_else(no_receiver)?
                    .set_demodulator_gain(gain)
                    .map_err(|e| e.to_string())?;
            }
            Command::SetPreamp(level) => {
                self.config.preamp = level;
                self.input.set_preamp_level(level);
            }
            Command::SetFilterWidth(width) => {
                if !self.input.set_filter_width(&mut self.config, width) {
                    return Err("the input has no filter to adjust".to_string());
                }
            }
            Command::SetDumpRf(enabled) => {
                self.config.dump_rf = enabled;
                self.input.set_dump_enabled(enabled);
            }
            Command::SetDumpAudio(enabled) => {
                self.config.dump_audio = enabled;
                self.receiver
                    .as_ref()
                    .ok_or_else(no_receiver)?
                    .set_dump_enabled(enabled);
            }
            Command::SetOption { name, value } => {
                let receiver = self.receiver.as_mut().ok_or_else(no_receiver)?;
                receiver
                    .set_option(&mut self.config, &name, &value)
                    .map_err(|e| e.to_string())?;
            }
            Command::Stop | Command::QuerySpectrum => {}
        }
        Ok(())
    }
}

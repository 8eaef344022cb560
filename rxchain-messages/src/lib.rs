mod command;
mod config;
mod event;

pub use command::{Command, CommandClass, DeviceCommand, Opcode};
pub use config::{
    Config, DeviceConfig, DumpFormat, ReceiverModeType, RemoteConfig, RemoteRole, SampleShape,
    SourceType,
};
pub use event::{Event, ReceiverState};

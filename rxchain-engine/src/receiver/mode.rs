use super::{Demodulator, OptionRegistry, ReceiverOption};
use crate::Result;
use crate::cw::CwDemodulator;
use crate::dsp::{Chain, StageId};
use rxchain_messages::{Config, ReceiverModeType, SampleShape};

/// The available demodulators.
pub enum ReceiverMode {
    Cw(CwDemodulator),
}

impl ReceiverMode {
    pub fn new(mode: ReceiverModeType) -> Self {
        match mode {
            ReceiverModeType::Cw => ReceiverMode::Cw(CwDemodulator::new()),
        }
    }

    fn inner(&self) -> &dyn Demodulator {
        match self {
            ReceiverMode::Cw(cw) => cw,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Demodulator {
        match self {
            ReceiverMode::Cw(cw) => cw,
        }
    }
}

impl Demodulator for ReceiverMode {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn options(&self) -> Vec<ReceiverOption> {
        self.inner().options()
    }

    fn is_shape_supported(&self, shape: SampleShape) -> bool {
        self.inner().is_shape_supported(shape)
    }

    fn pre_process(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        self.inner_mut().pre_process(config, options, chain, upstream)
    }

    fn receive(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        self.inner_mut().receive(config, options, chain, upstream)
    }

    fn post_process(
        &mut self,
        config: &Config,
        options: &OptionRegistry,
        chain: &mut Chain,
        upstream: StageId,
    ) -> Result<StageId> {
        self.inner_mut().post_process(config, options, chain, upstream)
    }

    fn option_changed(&mut self, config: &Config, name: &str, value: i32) {
        self.inner_mut().option_changed(config, name, value)
    }

    fn default_frequency(&self, config: &Config) -> i64 {
        self.inner().default_frequency(config)
    }

    fn is_frequency_supported(&self, config: &Config, frequency: i64) -> bool {
        self.inner().is_frequency_supported(config, frequency)
    }

    fn set_frequency(&mut self, frequency: i64) -> Result<()> {
        self.inner_mut().set_frequency(frequency)
    }

    fn set_gain(&mut self, gain: i32) -> Result<()> {
        self.inner_mut().set_gain(gain)
    }
}

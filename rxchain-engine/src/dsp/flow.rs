//! Stages that route blocks without changing them.

use super::{Flow, Stage, Switch};
use crate::Result;
use std::collections::VecDeque;

/// Forwards every block untouched. Used as a splitter root.
pub struct PassThrough;

impl Stage for PassThrough {
    fn process(&mut self, _block: &mut [f32]) -> Result<Flow> {
        Ok(Flow::Forward)
    }
}

/// Drops blocks while its switch is off.
pub struct Gate {
    open: Switch,
}

impl Gate {
    pub fn new(open: bool) -> (Self, Switch) {
        let switch = Switch::new(open);
        (
            Self {
                open: switch.clone(),
            },
            switch,
        )
    }
}

impl Stage for Gate {
    fn process(&mut self, _block: &mut [f32]) -> Result<Flow> {
        Ok(if self.open.is_on() {
            Flow::Forward
        } else {
            Flow::Drop
        })
    }
}

/// Delays the stream by a fixed number of values, starting with silence.
pub struct Delay {
    line: VecDeque<f32>,
}

impl Delay {
    pub fn new(values: usize) -> Self {
        Self {
            line: std::iter::repeat_n(0.0, values).collect(),
        }
    }

    pub fn seconds(rate: u32, channels: usize, seconds: u32) -> Self {
        Self::new(rate as usize * channels * seconds as usize)
    }
}

impl Stage for Delay {
    fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
        if self.line.is_empty() {
            return Ok(Flow::Forward);
        }
        for v in block.iter_mut() {
            self.line.push_back(*v);
            // The line never runs dry since one value goes in before one comes out
            *v = self.line.pop_front().unwrap_or_default();
        }
        Ok(Flow::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_drops_until_opened() {
        let (mut gate, switch) = Gate::new(false);
        assert_eq!(gate.process(&mut [1.0]).unwrap(), Flow::Drop);
        switch.set(true);
        assert_eq!(gate.process(&mut [1.0]).unwrap(), Flow::Forward);
    }

    #[test]
    fn test_delay_shifts_stream() {
        let mut delay = Delay::new(3);
        let mut first = [1.0, 2.0, 3.0, 4.0];
        let mut second = [5.0, 6.0, 7.0, 8.0];
        delay.process(&mut first).unwrap();
        delay.process(&mut second).unwrap();
        assert_eq!(first, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(second, [2.0, 3.0, 4.0, 5.0]);
    }
}

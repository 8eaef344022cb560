use crate::{Error, Result};
use log::{debug, error};
use std::collections::BTreeMap;

/// One allowed value of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    pub label: String,
    pub value: i32,
}

impl OptionValue {
    pub fn new(label: &str, value: i32) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

/// A named receiver option with its allowed values and current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverOption {
    pub name: String,
    pub description: String,
    pub values: Vec<OptionValue>,
    pub current: i32,
}

impl ReceiverOption {
    pub fn new(name: &str, description: &str, values: Vec<OptionValue>, current: i32) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            values,
            current,
        }
    }

    /// Label of the current value.
    pub fn current_label(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == self.current)
            .map(|v| v.label.as_str())
    }
}

/// Outcome of a successful set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Changed,
}

/// The options of one receiver mode.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    options: Vec<ReceiverOption>,
}

impl OptionRegistry {
    pub fn new(options: Vec<ReceiverOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[ReceiverOption] {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.find(name).map(|o| o.current)
    }

    fn find(&self, name: &str) -> Option<&ReceiverOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Set an option to one of its listed values.
    pub fn set_value(&mut self, name: &str, value: i32) -> Result<Change> {
        let Some(option) = self.options.iter_mut().find(|o| o.name == name) else {
            error!("No receiver option '{}'", name);
            return Err(Error::UnknownOption(name.to_string()));
        };
        if !option.values.iter().any(|v| v.value == value) {
            error!("Receiver option '{}' has no value {}", name, value);
            return Err(Error::InvalidOptionValue {
                option: name.to_string(),
                value: value.to_string(),
            });
        }
        if option.current == value {
            debug!("Option '{}' already at {}", name, value);
            return Ok(Change::Unchanged);
        }
        option.current = value;
        Ok(Change::Changed)
    }

    /// Set an option by the label of one of its values. Returns the value set.
    pub fn set_label(&mut self, name: &str, label: &str) -> Result<(i32, Change)> {
        let Some(option) = self.find(name) else {
            error!("No receiver option '{}'", name);
            return Err(Error::UnknownOption(name.to_string()));
        };
        let Some(value) = option.values.iter().find(|v| v.label == label).map(|v| v.value) else {
            error!("Receiver option '{}' has no value '{}'", name, label);
            return Err(Error::InvalidOptionValue {
                option: name.to_string(),
                value: label.to_string(),
            });
        };
        Ok((value, self.set_value(name, value)?))
    }

    /// Current label of every option, keyed by option name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .filter_map(|o| o.current_label().map(|l| (o.name.clone(), l.to_string())))
            .collect()
    }
}

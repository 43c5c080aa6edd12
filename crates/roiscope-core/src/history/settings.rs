//! Undo/redo of image display settings.
//!
//! Each record names a typed property path into [`ImageSettings`] with its old
//! and new value. Undo assigns the old values, redo the new ones.

use super::stack::CommandStack;
use crate::image::ImageSource;
use serde::{Deserialize, Serialize};

/// Display settings of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub active: bool,
    /// Hex color, e.g. `FF0000`.
    pub color: String,
    pub window_start: f64,
    pub window_end: f64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            active: true,
            color: "FFFFFF".to_string(),
            window_start: 0.0,
            window_end: 255.0,
        }
    }
}

/// Display settings of an image: current plane plus rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,
    pub z_count: u32,
    pub t_count: u32,
    pub current_z: u32,
    pub current_t: u32,
    /// `color` or `greyscale`.
    pub model: String,
    /// `normal` or `intmax`.
    pub projection: String,
    pub channels: Vec<ChannelSettings>,
}

impl ImageSettings {
    /// Settings for an image with `channel_count` active channels.
    pub fn new(width: u32, height: u32, channel_count: usize) -> Self {
        Self {
            width,
            height,
            z_count: 1,
            t_count: 1,
            current_z: 0,
            current_t: 0,
            model: "color".to_string(),
            projection: "normal".to_string(),
            channels: vec![ChannelSettings::default(); channel_count],
        }
    }

    /// Read the value at a path.
    pub fn get(&self, path: &SettingsPath) -> Option<SettingValue> {
        let value = match path {
            SettingsPath::CurrentZ => SettingValue::Integer(self.current_z),
            SettingsPath::CurrentT => SettingValue::Integer(self.current_t),
            SettingsPath::Model => SettingValue::Text(self.model.clone()),
            SettingsPath::Projection => SettingValue::Text(self.projection.clone()),
            SettingsPath::ChannelActive(i) => SettingValue::Boolean(self.channels.get(*i)?.active),
            SettingsPath::ChannelColor(i) => SettingValue::Text(self.channels.get(*i)?.color.clone()),
            SettingsPath::ChannelWindow(i) => {
                let channel = self.channels.get(*i)?;
                SettingValue::Window(channel.window_start, channel.window_end)
            }
        };
        Some(value)
    }

    /// Assign a value at a path. Returns false if the path does not resolve or
    /// the value has the wrong type.
    pub fn assign(&mut self, path: &SettingsPath, value: &SettingValue) -> bool {
        match (path, value) {
            (SettingsPath::CurrentZ, SettingValue::Integer(z)) => self.current_z = *z,
            (SettingsPath::CurrentT, SettingValue::Integer(t)) => self.current_t = *t,
            (SettingsPath::Model, SettingValue::Text(m)) => self.model = m.clone(),
            (SettingsPath::Projection, SettingValue::Text(p)) => self.projection = p.clone(),
            (SettingsPath::ChannelActive(i), SettingValue::Boolean(active)) => {
                let Some(channel) = self.channels.get_mut(*i) else {
                    return false;
                };
                channel.active = *active;
            }
            (SettingsPath::ChannelColor(i), SettingValue::Text(color)) => {
                let Some(channel) = self.channels.get_mut(*i) else {
                    return false;
                };
                channel.color = color.clone();
            }
            (SettingsPath::ChannelWindow(i), SettingValue::Window(start, end)) => {
                let Some(channel) = self.channels.get_mut(*i) else {
                    return false;
                };
                channel.window_start = *start;
                channel.window_end = *end;
            }
            _ => return false,
        }
        true
    }
}

impl ImageSource for ImageSettings {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn z_count(&self) -> u32 {
        self.z_count
    }

    fn t_count(&self) -> u32 {
        self.t_count
    }

    fn current_z(&self) -> u32 {
        self.current_z
    }

    fn current_t(&self) -> u32 {
        self.current_t
    }

    fn active_channels(&self) -> Vec<u32> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active)
            .map(|(i, _)| i as u32)
            .collect()
    }
}

/// A property path into [`ImageSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingsPath {
    CurrentZ,
    CurrentT,
    Model,
    Projection,
    ChannelActive(usize),
    ChannelColor(usize),
    ChannelWindow(usize),
}

impl SettingsPath {
    /// Type of the values stored at this path.
    pub fn value_type(&self) -> ValueType {
        match self {
            SettingsPath::CurrentZ | SettingsPath::CurrentT => ValueType::Integer,
            SettingsPath::Model | SettingsPath::Projection | SettingsPath::ChannelColor(_) => {
                ValueType::Text
            }
            SettingsPath::ChannelActive(_) => ValueType::Boolean,
            SettingsPath::ChannelWindow(_) => ValueType::Window,
        }
    }
}

/// Declared type of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Integer,
    Boolean,
    Text,
    Window,
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Integer(u32),
    Boolean(bool),
    Text(String),
    /// Channel window `(start, end)`.
    Window(f64, f64),
}

impl SettingValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            SettingValue::Integer(_) => ValueType::Integer,
            SettingValue::Boolean(_) => ValueType::Boolean,
            SettingValue::Text(_) => ValueType::Text,
            SettingValue::Window(..) => ValueType::Window,
        }
    }
}

/// One property change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub path: SettingsPath,
    pub value_type: ValueType,
    pub old_val: SettingValue,
    pub new_val: SettingValue,
}

impl PropertyRecord {
    pub fn new(path: SettingsPath, old_val: SettingValue, new_val: SettingValue) -> Self {
        Self {
            value_type: path.value_type(),
            path,
            old_val,
            new_val,
        }
    }

    fn apply(&self, settings: &mut ImageSettings, undo: bool) -> bool {
        let value = if undo { &self.old_val } else { &self.new_val };
        if value.value_type() != self.value_type || self.path.value_type() != self.value_type {
            log::warn!(
                "Skipping settings record for {:?}: expected {:?}, got {:?}",
                self.path,
                self.value_type,
                value.value_type()
            );
            return false;
        }
        let applied = settings.assign(&self.path, value);
        if !applied {
            log::warn!("Skipping settings record for unresolved path {:?}", self.path);
        }
        applied
    }
}

/// Undo/redo stack of settings changes.
#[derive(Debug, Clone, Default)]
pub struct SettingsHistory {
    stack: CommandStack<Vec<PropertyRecord>>,
}

impl SettingsHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            stack: CommandStack::new(limit),
        }
    }

    /// Record one change as its own undo step.
    pub fn add_history(&mut self, record: PropertyRecord) {
        self.add_history_batch(vec![record]);
    }

    /// Record several changes as one undo step.
    pub fn add_history_batch(&mut self, records: Vec<PropertyRecord>) {
        if records.is_empty() {
            return;
        }
        log::debug!("Settings history: {} record(s)", records.len());
        self.stack.push(records);
    }

    /// Change a setting and record it.
    pub fn set(&mut self, settings: &mut ImageSettings, path: SettingsPath, value: SettingValue) -> bool {
        let Some(old_val) = settings.get(&path) else {
            return false;
        };
        let record = PropertyRecord::new(path, old_val, value);
        if !record.apply(settings, false) {
            return false;
        }
        self.add_history(record);
        true
    }

    /// Undo the latest step. Returns false if there was nothing to undo.
    pub fn undo(&mut self, settings: &mut ImageSettings) -> bool {
        let Some(records) = self.stack.undo() else {
            return false;
        };
        for record in records.iter().rev() {
            record.apply(settings, true);
        }
        true
    }

    /// Redo the next step. Returns false if there was nothing to redo.
    pub fn redo(&mut self, settings: &mut ImageSettings) -> bool {
        let Some(records) = self.stack.redo() else {
            return false;
        };
        for record in records {
            record.apply(settings, false);
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

//! Undo/redo histories.

mod regions;
mod settings;
mod stack;

pub use regions::{
    GeometryEdit, GeometryEditLog, HistoryAction, HistoryEntry, HistoryPush, HistoryRecord,
    PropertyDiff, RegionsHistory,
};
pub use settings::{
    ChannelSettings, ImageSettings, PropertyRecord, SettingValue, SettingsHistory, SettingsPath,
    ValueType,
};
pub use stack::CommandStack;

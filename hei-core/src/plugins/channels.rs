//! Log channels allocated through `add_log_level`

use hei_plugin_api::LogLevelId;
use serde::Serialize;

use super::capabilities::{ModuleId, ModuleOwner};

/// A named log channel.
#[derive(Debug, Clone)]
pub struct LogChannel {
    pub name: String,
    /// `0xRRGGBB`
    pub colour: u32,
    pub enabled: bool,
    /// `None` for channels the host created itself.
    pub owner: Option<ModuleOwner>,
}

/// Summary row for listing channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogChannelInfo {
    pub id: u32,
    pub name: String,
    pub colour: String,
    pub enabled: bool,
}

/// Growable channel table. Ids are slot indices and stay valid forever:
/// removing a module's channels leaves empty slots behind.
#[derive(Debug, Default)]
pub struct LogChannels {
    slots: Vec<Option<LogChannel>>,
}

impl LogChannels {
    pub fn add(&mut self, channel: LogChannel) -> LogLevelId {
        let id = LogLevelId(self.slots.len() as u32);
        self.slots.push(Some(channel));
        id
    }

    pub fn get(&self, id: LogLevelId) -> Option<&LogChannel> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Enable or disable every live channel called `name`.
    /// Returns how many channels matched.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> usize {
        let mut matched = 0;
        for channel in self.slots.iter_mut().flatten() {
            if channel.name.eq_ignore_ascii_case(name) {
                channel.enabled = enabled;
                matched += 1;
            }
        }
        matched
    }

    pub fn remove_owner(&mut self, module: ModuleId) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot
                .as_ref()
                .and_then(|c| c.owner.as_ref())
                .is_some_and(|o| o.id == module)
            {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (LogLevelId, &LogChannel)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (LogLevelId(i as u32), c)))
    }

    pub fn describe(&self) -> Vec<LogChannelInfo> {
        self.iter()
            .map(|(id, c)| LogChannelInfo {
                id: id.0,
                name: c.name.clone(),
                colour: format!("#{:06x}", c.colour & 0x00ff_ffff),
                enabled: c.enabled,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn channel(name: &str, owner: Option<u32>) -> LogChannel {
        LogChannel {
            name: name.to_string(),
            colour: 0x33aa33,
            enabled: true,
            owner: owner.map(|id| ModuleOwner {
                id: ModuleId(id),
                name: Arc::from("m"),
            }),
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut channels = LogChannels::default();
        assert_eq!(channels.add(channel("host", None)), LogLevelId(0));
        assert_eq!(channels.add(channel("dds", Some(1))), LogLevelId(1));
        assert_eq!(channels.get(LogLevelId(1)).unwrap().name, "dds");
        assert!(channels.get(LogLevelId(9)).is_none());
    }

    #[test]
    fn test_ids_survive_removal() {
        let mut channels = LogChannels::default();
        channels.add(channel("a", Some(1)));
        let b = channels.add(channel("b", Some(2)));

        assert_eq!(channels.remove_owner(ModuleId(1)), 1);
        assert!(channels.get(LogLevelId(0)).is_none());
        assert_eq!(channels.get(b).unwrap().name, "b");

        // new channels never reuse the freed slot
        assert_eq!(channels.add(channel("c", None)), LogLevelId(2));
        assert_eq!(channels.len(), 2);
    }

    #[test]
    fn test_host_channels_are_never_removed() {
        let mut channels = LogChannels::default();
        channels.add(channel("host", None));
        assert_eq!(channels.remove_owner(ModuleId(1)), 0);
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn test_set_enabled_by_name() {
        let mut channels = LogChannels::default();
        let id = channels.add(channel("PAK", Some(1)));
        assert_eq!(channels.set_enabled("pak", false), 1);
        assert!(!channels.get(id).unwrap().enabled);
        assert_eq!(channels.set_enabled("missing", false), 0);
    }

    #[test]
    fn test_describe_formats_colour() {
        let mut channels = LogChannels::default();
        channels.add(channel("dds", None));
        let rows = channels.describe();
        assert_eq!(rows[0].colour, "#33aa33");
    }
}

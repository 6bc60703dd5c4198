//! Capability tables - what modules have registered, keyed by extension or name

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hei_plugin_api::{GraphicsDriver, ImageLoaderFn, PackageLoaderFn};
use serde::Serialize;

use super::channels::LogChannels;

/// Identity of a loaded module. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The module that registered an entry. Used for unload bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOwner {
    pub id: ModuleId,
    pub name: Arc<str>,
}

/// The kinds of capability a module can add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    PackageLoader,
    ImageLoader,
    GraphicsBackend,
    LogLevel,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PackageLoader => "package loader",
            Self::ImageLoader => "image loader",
            Self::GraphicsBackend => "graphics backend",
            Self::LogLevel => "log level",
        };
        f.write_str(name)
    }
}

/// A registered handler, as handed in through the export table.
#[derive(Debug, Clone, Copy)]
pub enum Capability {
    PackageLoader(PackageLoaderFn),
    ImageLoader(ImageLoaderFn),
    GraphicsBackend(GraphicsDriver),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::PackageLoader(_) => CapabilityKind::PackageLoader,
            Self::ImageLoader(_) => CapabilityKind::ImageLoader,
            Self::GraphicsBackend(_) => CapabilityKind::GraphicsBackend,
        }
    }
}

/// A `(kind, key)` pair a module registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CapabilityKey {
    pub kind: CapabilityKind,
    pub key: String,
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.key)
    }
}

/// A row of [`CapabilityTables::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityInfo {
    pub kind: CapabilityKind,
    pub key: String,
    pub module: String,
}

/// Normalise a registration or lookup key: trimmed, leading dots removed,
/// lower-case. Returns `None` for keys that end up empty.
pub fn normalize_key(key: &str) -> Option<String> {
    let key = key.trim().trim_start_matches('.');
    (!key.is_empty()).then(|| key.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct CapabilityEntry<H> {
    pub handler: H,
    pub owner: ModuleOwner,
}

/// One table per capability kind. Keys are unique; first registration wins.
#[derive(Debug)]
pub struct CapabilityTable<H> {
    entries: HashMap<String, CapabilityEntry<H>>,
}

impl<H: Copy> CapabilityTable<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert `handler` under an already-normalised `key`.
    ///
    /// Returns the current owner if the key is taken.
    pub fn insert(&mut self, key: String, handler: H, owner: ModuleOwner) -> Result<(), ModuleOwner> {
        if let Some(existing) = self.entries.get(&key) {
            return Err(existing.owner.clone());
        }
        self.entries.insert(key, CapabilityEntry { handler, owner });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CapabilityEntry<H>> {
        self.entries.get(key)
    }

    /// Copy of the handler for `key`, so callers can drop the table lock
    /// before invoking it.
    pub fn handler(&self, key: &str) -> Option<H> {
        self.entries.get(key).map(|e| e.handler)
    }

    /// Remove every entry owned by `module`, returning how many went.
    pub fn remove_owner(&mut self, module: ModuleId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner.id != module);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CapabilityEntry<H>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sorted keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Copy> Default for CapabilityTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every capability table the host keeps.
#[derive(Debug, Default)]
pub struct CapabilityTables {
    pub packages: CapabilityTable<PackageLoaderFn>,
    pub images: CapabilityTable<ImageLoaderFn>,
    pub graphics: CapabilityTable<GraphicsDriver>,
    pub log_levels: LogChannels,
}

impl CapabilityTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a capability to its table.
    pub fn insert(
        &mut self,
        key: String,
        capability: Capability,
        owner: ModuleOwner,
    ) -> Result<(), ModuleOwner> {
        match capability {
            Capability::PackageLoader(f) => self.packages.insert(key, f, owner),
            Capability::ImageLoader(f) => self.images.insert(key, f, owner),
            Capability::GraphicsBackend(d) => self.graphics.insert(key, d, owner),
        }
    }

    /// Drop everything `module` registered, in every table.
    pub fn remove_owner(&mut self, module: ModuleId) -> usize {
        self.packages.remove_owner(module)
            + self.images.remove_owner(module)
            + self.graphics.remove_owner(module)
            + self.log_levels.remove_owner(module)
    }

    /// Flat, sorted listing of every entry.
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        fn rows<H: Copy>(kind: CapabilityKind, table: &CapabilityTable<H>) -> Vec<CapabilityInfo> {
            table
                .iter()
                .map(|(key, entry)| CapabilityInfo {
                    kind,
                    key: key.to_string(),
                    module: entry.owner.name.to_string(),
                })
                .collect()
        }

        let mut all = rows(CapabilityKind::PackageLoader, &self.packages);
        all.extend(rows(CapabilityKind::ImageLoader, &self.images));
        all.extend(rows(CapabilityKind::GraphicsBackend, &self.graphics));
        all.extend(self.log_levels.iter().map(|(_, channel)| CapabilityInfo {
            kind: CapabilityKind::LogLevel,
            key: channel.name.clone(),
            module: channel
                .owner
                .as_ref()
                .map_or_else(|| "host".to_string(), |o| o.name.to_string()),
        }));
        all.sort_by(|a, b| (a.kind, &a.key).cmp(&(b.kind, &b.key)));
        all
    }
}

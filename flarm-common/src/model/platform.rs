use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical platform family a package is built for.
///
/// The names are the tags used in package filenames and manifests:
/// `Knosthalij` is the Windows family, `Danenone` covers Linux and macOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformTag {
    Knosthalij,
    Danenone,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Knosthalij => "Knosthalij",
            PlatformTag::Danenone => "Danenone",
        }
    }

    /// The other family.
    pub fn opposite(&self) -> PlatformTag {
        match self {
            PlatformTag::Knosthalij => PlatformTag::Danenone,
            PlatformTag::Danenone => PlatformTag::Knosthalij,
        }
    }

    pub fn os_family(&self) -> &'static str {
        match self {
            PlatformTag::Knosthalij => "Windows",
            PlatformTag::Danenone => "Linux/macOS",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase alias strings that identify each platform family in loosely
/// named inputs (asset filenames, manifest `platform` values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAliases {
    pub knosthalij: Vec<String>,
    pub danenone: Vec<String>,
}

impl PlatformAliases {
    pub fn aliases_for(&self, tag: PlatformTag) -> &[String] {
        match tag {
            PlatformTag::Knosthalij => &self.knosthalij,
            PlatformTag::Danenone => &self.danenone,
        }
    }
}

impl Default for PlatformAliases {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            knosthalij: owned(&["knosthalij", "windows", "win"]),
            danenone: owned(&["danenone", "linux", "mac", "macos", "darwin"]),
        }
    }
}

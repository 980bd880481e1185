// flarm-core/src/platform.rs
use flarm_common::model::{PlatformAliases, PlatformTag};
use tracing::debug;

/// Platform family of the running build.
pub fn current_platform_tag() -> PlatformTag {
    if cfg!(windows) {
        PlatformTag::Knosthalij
    } else {
        PlatformTag::Danenone
    }
}

/// Maps a loosely written platform value onto a family.
///
/// A token that equals an alias wins over a mere substring hit, so
/// `darwin` is not mistaken for `win`. Values that match both families,
/// or neither, are left unclassified.
pub fn classify_platform(declared: &str, aliases: &PlatformAliases) -> Option<PlatformTag> {
    let lowered = declared.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let families = [PlatformTag::Knosthalij, PlatformTag::Danenone];

    let exact: Vec<PlatformTag> = families
        .into_iter()
        .filter(|tag| {
            aliases
                .aliases_for(*tag)
                .iter()
                .any(|alias| tokens.contains(&alias.as_str()))
        })
        .collect();
    if let [only] = exact.as_slice() {
        return Some(*only);
    }

    let partial: Vec<PlatformTag> = families
        .into_iter()
        .filter(|tag| {
            aliases
                .aliases_for(*tag)
                .iter()
                .any(|alias| lowered.contains(alias.as_str()))
        })
        .collect();
    match partial.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub compatible: bool,
    /// Empty when compatible.
    pub reason: String,
}

impl Compatibility {
    fn ok() -> Self {
        Self {
            compatible: true,
            reason: String::new(),
        }
    }
}

/// Decides whether a package declaring `declared` can run on `current`.
/// Empty or unrecognized declarations are accepted.
pub fn check_compatibility(
    declared: &str,
    current: PlatformTag,
    aliases: &PlatformAliases,
) -> Compatibility {
    match classify_platform(declared, aliases) {
        Some(tag) if tag != current => {
            debug!(
                "Declared platform '{}' maps to {}, running on {}",
                declared, tag, current
            );
            Compatibility {
                compatible: false,
                reason: format!(
                    "This package is designed for {} ({}), not compatible with {} ({})",
                    tag.os_family(),
                    tag,
                    current.os_family(),
                    current
                ),
            }
        }
        _ => Compatibility::ok(),
    }
}

// flarm-core/src/asset.rs
//! Release asset naming convention and selection.
//!
//! Installable assets are named `<identifier>-<version>-<platform>.<ext>`.
//! The identifier is matched lazily and the version greedily, so the
//! platform is always the last hyphen-delimited segment. When the caller
//! knows the package's short name, a filename starting with `<short>-` is
//! split right after it instead, which keeps hyphenated identifiers intact.

use flarm_common::error::{FlarmError, Result};
use flarm_common::model::{AssetSelection, PlatformAliases, PlatformTag, ReleaseAsset};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::platform::classify_platform;

/// Segments of a conforming asset filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFileName {
    pub identifier: String,
    pub version: String,
    pub platform: String,
}

#[derive(Debug, Clone)]
pub struct AssetPattern {
    full: Regex,
    tail: Regex,
}

impl AssetPattern {
    pub fn new(extension: &str) -> Result<Self> {
        let ext = regex::escape(extension.trim_start_matches('.'));
        let build = |pattern: String| {
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| FlarmError::Config(format!("Invalid asset pattern: {e}")))
        };
        Ok(Self {
            full: build(format!(
                r"^(.+?)-([0-9A-Za-z.\-_]+)-([0-9A-Za-z._\-]+)\.{ext}$"
            ))?,
            tail: build(format!(r"^([0-9A-Za-z.\-_]+)-([0-9A-Za-z._\-]+)\.{ext}$"))?,
        })
    }

    pub fn parse(&self, name: &str) -> Option<AssetFileName> {
        let caps = self.full.captures(name)?;
        Some(AssetFileName {
            identifier: caps[1].to_string(),
            version: caps[2].to_string(),
            platform: caps[3].to_string(),
        })
    }

    /// Parses `name`, anchoring the identifier to `short_name` when the
    /// filename starts with it.
    pub fn parse_with_hint(&self, name: &str, short_name: &str) -> Option<AssetFileName> {
        if !short_name.is_empty() {
            let prefix_len = short_name.len() + 1;
            let anchored = name
                .get(..prefix_len)
                .filter(|prefix| prefix.eq_ignore_ascii_case(&format!("{short_name}-")));
            if let Some(prefix) = anchored {
                if let Some(caps) = self.tail.captures(&name[prefix_len..]) {
                    return Some(AssetFileName {
                        identifier: prefix[..short_name.len()].to_string(),
                        version: caps[1].to_string(),
                        platform: caps[2].to_string(),
                    });
                }
            }
        }
        self.parse(name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.full.is_match(name)
    }
}

/// True when a filename's platform segment names the `current` family
/// through one of its aliases without naming the other family outright.
fn platform_segment_matches(segment: &str, current: PlatformTag, aliases: &PlatformAliases) -> bool {
    let lowered = segment.to_lowercase();
    let names_current = aliases
        .aliases_for(current)
        .iter()
        .any(|alias| lowered.contains(alias.as_str()));
    names_current && classify_platform(segment, aliases) != Some(current.opposite())
}

/// Picks the asset to install from `assets`, which are expected newest
/// first.
///
/// The first conforming asset built for the current platform wins. A
/// platform segment that contains a current alias but classifies to the
/// other family (`darwin` holds `win`) does not count as built for it.
/// Failing that, the first conforming asset whose identifier is the package's short
/// name is taken regardless of platform.
pub fn select_best_asset(
    assets: &[ReleaseAsset],
    short_name: &str,
    current: PlatformTag,
    aliases: &PlatformAliases,
    pattern: &AssetPattern,
) -> Option<AssetSelection> {
    let candidates: Vec<(&ReleaseAsset, AssetFileName)> = assets
        .iter()
        .filter_map(|asset| {
            pattern
                .parse_with_hint(&asset.name, short_name)
                .map(|parsed| (asset, parsed))
        })
        .collect();
    debug!(
        "{} of {} assets follow the naming convention",
        candidates.len(),
        assets.len()
    );

    let by_platform = candidates
        .iter()
        .find(|(_, parsed)| platform_segment_matches(&parsed.platform, current, aliases));
    let chosen = by_platform.or_else(|| {
        candidates
            .iter()
            .find(|(_, parsed)| parsed.identifier.eq_ignore_ascii_case(short_name))
    });

    chosen.map(|(asset, parsed)| {
        debug!(
            "Selected asset {} (version {}, platform {})",
            asset.name, parsed.version, parsed.platform
        );
        AssetSelection {
            asset: (*asset).clone(),
            version: parsed.version.clone(),
            platform: parsed.platform.clone(),
        }
    })
}

use serde::{Deserialize, Serialize};

use crate::error::{FlarmError, Result};

/// Value manifests and older installs use for fields nobody filled in.
pub const PLACEHOLDER_VALUE: &str = "Unknown";

/// The four fields that pin down one install location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub publisher: String,
    pub app_id: String,
    pub version: String,
    pub platform: String,
}

impl PackageIdentity {
    pub fn new(
        publisher: impl Into<String>,
        app_id: impl Into<String>,
        version: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            publisher: publisher.into(),
            app_id: app_id.into(),
            version: version.into(),
            platform: platform.into(),
        }
    }

    /// `<publisher>.<app_id>.<version>-<platform>`
    pub fn canonical_dir_name(&self) -> String {
        format!(
            "{}.{}.{}-{}",
            self.publisher, self.app_id, self.version, self.platform
        )
    }

    /// Fails with `InvalidRequest` if any field could steer the canonical
    /// directory out of the apps root.
    pub fn ensure_path_safe(&self) -> Result<()> {
        let fields = [
            ("publisher", &self.publisher),
            ("app", &self.app_id),
            ("version", &self.version),
            ("platform", &self.platform),
        ];
        for (label, value) in fields {
            if !is_path_safe_component(value) {
                return Err(FlarmError::InvalidRequest(format!(
                    "Package {label} '{}' cannot be used in an install path",
                    value.escape_debug()
                )));
            }
        }
        Ok(())
    }

    /// All four fields carry real values.
    pub fn is_complete(&self) -> bool {
        [&self.publisher, &self.app_id, &self.version, &self.platform]
            .iter()
            .all(|value| !value.trim().is_empty() && value.as_str() != PLACEHOLDER_VALUE)
    }

    /// Best-effort inverse of [`canonical_dir_name`](Self::canonical_dir_name).
    ///
    /// Dots inside the publisher or app id cannot be told apart from the
    /// separators, so those land in the version.
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        let (rest, platform) = name.rsplit_once('-')?;
        let mut parts = rest.splitn(3, '.');
        let publisher = parts.next()?;
        let app_id = parts.next()?;
        let version = parts.next()?;
        if [publisher, app_id, version, platform]
            .iter()
            .any(|part| part.is_empty())
        {
            return None;
        }
        Some(Self::new(publisher, app_id, version, platform))
    }
}

fn is_path_safe_component(value: &str) -> bool {
    !value.trim().is_empty()
        && value != "."
        && value != ".."
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn canonical_name_layout() {
        let id = PackageIdentity::new("acme", "viewer", "1.2.0", "Knosthalij");
        assert_eq!(id.canonical_dir_name(), "acme.viewer.1.2.0-Knosthalij");
        assert_eq!(id.canonical_dir_name(), id.clone().canonical_dir_name());
    }

    #[test]
    fn distinct_identities_get_distinct_dirs() {
        let ids = [
            PackageIdentity::new("acme", "viewer", "1.0", "Knosthalij"),
            PackageIdentity::new("acme", "viewer", "1.0", "Danenone"),
            PackageIdentity::new("acme", "viewer", "1.1", "Knosthalij"),
            PackageIdentity::new("acme", "editor", "1.0", "Knosthalij"),
            PackageIdentity::new("other", "viewer", "1.0", "Knosthalij"),
        ];
        let names: HashSet<String> = ids.iter().map(|id| id.canonical_dir_name()).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn placeholders_make_identity_incomplete() {
        assert!(PackageIdentity::new("a", "b", "1", "Danenone").is_complete());
        assert!(!PackageIdentity::new("a", "b", "Unknown", "Danenone").is_complete());
        assert!(!PackageIdentity::new("a", "", "1", "Danenone").is_complete());
    }

    #[test]
    fn traversal_and_separators_are_rejected() {
        assert!(PackageIdentity::new("acme", "viewer", "1.2.0", "Danenone")
            .ensure_path_safe()
            .is_ok());
        assert!(PackageIdentity::new("acme", "viewer", "Unknown", "Unknown")
            .ensure_path_safe()
            .is_ok());

        let hostile = [
            PackageIdentity::new("../../escaped", "viewer", "1.0", "Danenone"),
            PackageIdentity::new("acme", "..", "1.0", "Danenone"),
            PackageIdentity::new("acme", "viewer", "..\\..\\x", "Danenone"),
            PackageIdentity::new("acme", "viewer", "1.0", "C:"),
            PackageIdentity::new("acme", "view\0er", "1.0", "Danenone"),
            PackageIdentity::new(" ", "viewer", "1.0", "Danenone"),
            PackageIdentity::new("/abs", "viewer", "1.0", "Danenone"),
        ];
        for id in hostile {
            let err = id.ensure_path_safe().unwrap_err();
            assert!(matches!(err, FlarmError::InvalidRequest(_)), "{id:?}");
        }
    }

    #[test]
    fn dir_names_parse_back() {
        let parsed = PackageIdentity::parse_dir_name("acme.viewer.1.2.0-Knosthalij").unwrap();
        assert_eq!(
            parsed,
            PackageIdentity::new("acme", "viewer", "1.2.0", "Knosthalij")
        );
        assert!(PackageIdentity::parse_dir_name("stray-folder").is_none());
        assert!(PackageIdentity::parse_dir_name("notes.txt").is_none());
    }
}

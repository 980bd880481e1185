use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestField {
    Name,
    Publisher,
    App,
    Version,
    Platform,
    Author,
}

impl ManifestField {
    pub const ALL: [ManifestField; 6] = [
        ManifestField::Name,
        ManifestField::Publisher,
        ManifestField::App,
        ManifestField::Version,
        ManifestField::Platform,
        ManifestField::Author,
    ];

    /// Fields that make up a package identity.
    pub const REQUIRED: [ManifestField; 4] = [
        ManifestField::Publisher,
        ManifestField::App,
        ManifestField::Version,
        ManifestField::Platform,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ManifestField::Name => "name",
            ManifestField::Publisher => "publisher",
            ManifestField::App => "app",
            ManifestField::Version => "version",
            ManifestField::Platform => "platform",
            ManifestField::Author => "author",
        }
    }

    /// Case-insensitive lookup of a whitelisted element name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.tag().eq_ignore_ascii_case(tag))
    }
}

/// Package metadata read from a `details.xml` document.
///
/// Every field is optional; blank values are stored as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: Option<String>,
    pub publisher: Option<String>,
    pub app: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub author: Option<String>,
}

impl Manifest {
    pub fn get(&self, field: ManifestField) -> Option<&str> {
        let slot = match field {
            ManifestField::Name => &self.name,
            ManifestField::Publisher => &self.publisher,
            ManifestField::App => &self.app,
            ManifestField::Version => &self.version,
            ManifestField::Platform => &self.platform,
            ManifestField::Author => &self.author,
        };
        slot.as_deref()
    }

    pub fn value_or<'a>(&'a self, field: ManifestField, default: &'a str) -> &'a str {
        self.get(field).unwrap_or(default)
    }

    /// Stores a trimmed value, treating blank text as absent.
    pub fn set(&mut self, field: ManifestField, value: &str) {
        let trimmed = value.trim();
        let value = (!trimmed.is_empty()).then(|| trimmed.to_string());
        match field {
            ManifestField::Name => self.name = value,
            ManifestField::Publisher => self.publisher = value,
            ManifestField::App => self.app = value,
            ManifestField::Version => self.version = value,
            ManifestField::Platform => self.platform = value,
            ManifestField::Author => self.author = value,
        }
    }

    /// Identity fields the document does not provide.
    pub fn missing_required(&self) -> Vec<ManifestField> {
        ManifestField::REQUIRED
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        ManifestField::ALL
            .into_iter()
            .all(|field| self.get(field).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_absent() {
        let mut manifest = Manifest::default();
        manifest.set(ManifestField::Publisher, "   ");
        manifest.set(ManifestField::App, "  viewer \n");
        assert_eq!(manifest.get(ManifestField::Publisher), None);
        assert_eq!(manifest.get(ManifestField::App), Some("viewer"));
        assert_eq!(manifest.value_or(ManifestField::Publisher, "alice"), "alice");
    }

    #[test]
    fn missing_required_lists_identity_gaps() {
        let mut manifest = Manifest::default();
        manifest.set(ManifestField::Publisher, "acme");
        manifest.set(ManifestField::Author, "someone");
        assert_eq!(
            manifest.missing_required(),
            vec![
                ManifestField::App,
                ManifestField::Version,
                ManifestField::Platform
            ]
        );
    }

    #[test]
    fn tags_match_case_insensitively() {
        assert_eq!(ManifestField::from_tag("PUBLISHER"), Some(ManifestField::Publisher));
        assert_eq!(ManifestField::from_tag("Name"), Some(ManifestField::Name));
        assert_eq!(ManifestField::from_tag("icon"), None);
    }
}

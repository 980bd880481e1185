use serde::{Deserialize, Serialize};

/// One downloadable file attached to a remote release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub release_tag: Option<String>,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            download_url: download_url.into(),
            release_tag: None,
        }
    }

    pub fn with_release_tag(mut self, tag: impl Into<String>) -> Self {
        self.release_tag = Some(tag.into());
        self
    }
}

/// Asset chosen for installation, with the version and platform segments
/// read from its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSelection {
    pub asset: ReleaseAsset,
    pub version: String,
    pub platform: String,
}

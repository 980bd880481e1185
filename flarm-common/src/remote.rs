// flarm-common/src/remote.rs
use std::io::Read;

use crate::error::Result;
use crate::model::ReleaseAsset;

/// Body of a download, read incrementally.
pub struct RemoteStream {
    pub reader: Box<dyn Read + Send>,
    /// Declared size, when the server sent one.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Everything the installer needs from the place packages are published.
pub trait RemoteRepository: Send + Sync {
    /// Assets of every release, newest release first, each tagged with the
    /// release it belongs to.
    fn list_release_assets(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseAsset>>;

    /// The raw manifest document, or `None` when the repository has none.
    fn fetch_manifest(&self, owner: &str, repo: &str) -> Result<Option<String>>;

    fn fetch_bytes(&self, url: &str) -> Result<RemoteStream>;

    /// Page a person can browse to pick a release by hand.
    fn releases_page_url(&self, owner: &str, repo: &str) -> String;
}

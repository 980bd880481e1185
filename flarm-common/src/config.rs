// flarm-common/src/config.rs
use std::env;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use directories::{ProjectDirs, UserDirs};
use tracing::debug;

use super::error::{FlarmError, Result};
use crate::model::PlatformAliases;

pub const DEFAULT_SCHEME: &str = "flarmstore";
pub const DEFAULT_PACKAGE_EXTENSION: &str = "iflapp";
pub const DEFAULT_MANIFEST_FILE: &str = "details.xml";
const APPS_FOLDER_NAME: &str = "FLARM Apps";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const API_TIMEOUT_SECS: u64 = 15;
const MANIFEST_TIMEOUT_SECS: u64 = 5;
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub apps_root: PathBuf,
    pub desktop_dir: PathBuf,
    pub scheme: String,
    pub package_extension: String,
    pub manifest_file_name: String,
    pub platform_aliases: PlatformAliases,
    pub api_base_url: String,
    pub raw_base_url: String,
    pub web_base_url: String,
    pub manifest_branch: String,
    pub github_api_token: Option<String>,
    pub connect_timeout: Duration,
    pub api_timeout: Duration,
    pub manifest_timeout: Duration,
    pub download_timeout: Duration,
}

impl Config {
    /// Config rooted at explicit directories with every other setting at its
    /// default.
    pub fn new(apps_root: impl Into<PathBuf>, desktop_dir: impl Into<PathBuf>) -> Self {
        Self {
            apps_root: apps_root.into(),
            desktop_dir: desktop_dir.into(),
            scheme: DEFAULT_SCHEME.to_string(),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            manifest_file_name: DEFAULT_MANIFEST_FILE.to_string(),
            platform_aliases: PlatformAliases::default(),
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            web_base_url: "https://github.com".to_string(),
            manifest_branch: "main".to_string(),
            github_api_token: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            api_timeout: Duration::from_secs(API_TIMEOUT_SECS),
            manifest_timeout: Duration::from_secs(MANIFEST_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }

    pub fn load() -> Result<Self> {
        debug!("Loading flarm configuration");

        let user_dirs = UserDirs::new().ok_or_else(|| {
            FlarmError::Config("Could not determine the user's home directory".to_string())
        })?;
        let home = user_dirs.home_dir().to_path_buf();

        let apps_root = match non_empty_var("FLARM_APPS_ROOT") {
            Some(root) => PathBuf::from(root),
            None => user_dirs
                .document_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join("Documents"))
                .join(APPS_FOLDER_NAME),
        };
        debug!("Effective apps root: {}", apps_root.display());

        let desktop_dir = match non_empty_var("FLARM_DESKTOP_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => user_dirs
                .desktop_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join("Desktop")),
        };
        debug!("Effective desktop dir: {}", desktop_dir.display());

        let mut config = Self::new(apps_root, desktop_dir);
        if let Some(api) = non_empty_var("FLARM_GITHUB_API") {
            config.api_base_url = api.trim_end_matches('/').to_string();
        }
        config.github_api_token = non_empty_var("FLARM_GITHUB_TOKEN");

        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    pub fn apps_root(&self) -> &Path {
        &self.apps_root
    }

    /// The install directory for a canonical name. The name must be a single
    /// plain path component, so the result is always a direct child of the
    /// apps root.
    pub fn install_dir(&self, canonical_dir_name: &str) -> Result<PathBuf> {
        let mut components = Path::new(canonical_dir_name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || canonical_dir_name.contains(&['\\', ':'][..]) {
            return Err(FlarmError::InvalidRequest(format!(
                "'{}' is not a valid install directory name",
                canonical_dir_name.escape_debug()
            )));
        }
        Ok(self.apps_root.join(canonical_dir_name))
    }

    pub fn logs_dir(&self) -> PathBuf {
        ProjectDirs::from("", "", "flarm")
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .unwrap_or_else(|| self.apps_root.join(".logs"))
    }

    pub fn releases_api_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/releases", self.api_base_url)
    }

    pub fn releases_page_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{owner}/{repo}/releases", self.web_base_url)
    }

    pub fn repository_page_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{owner}/{repo}", self.web_base_url)
    }

    pub fn manifest_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/{owner}/{repo}/{}/{}",
            self.raw_base_url, self.manifest_branch, self.manifest_file_name
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

// flarm-net/src/github.rs
//! GitHub-backed [`RemoteRepository`]: release assets come from the REST
//! API, manifests from the raw content host.

use std::sync::OnceLock;
use std::time::Duration;

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::ReleaseAsset;
use flarm_common::remote::{RemoteRepository, RemoteStream};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::http::{build_http_client, check_status, map_request_error, status_error};
use crate::validation::validate_url;

const RELEASES_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// Flattens a releases listing, keeping the API's newest-first order.
/// Drafts are skipped since their assets cannot be downloaded anonymously.
pub fn parse_release_assets(body: &str) -> Result<Vec<ReleaseAsset>> {
    let releases: Vec<Release> = serde_json::from_str(body)?;
    Ok(releases
        .into_iter()
        .filter(|release| !release.draft)
        .flat_map(|release| {
            let tag = release.tag_name;
            release.assets.into_iter().map(move |asset| {
                ReleaseAsset::new(asset.name, asset.browser_download_url)
                    .with_release_tag(tag.clone())
            })
        })
        .collect())
}

pub struct GithubClient {
    config: Config,
    // Built on first use so the blocking client is created on the worker
    // thread rather than inside the async runtime.
    client: OnceLock<Client>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api", &self.config.api_base_url)
            .field("authenticated", &self.config.github_api_token.is_some())
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = build_http_client(&self.config)?;
        Ok(self.client.get_or_init(|| built))
    }

    fn api_request(&self, url: &str) -> Result<RequestBuilder> {
        let mut request = self
            .client()?
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(self.config.api_timeout);
        if let Some(token) = &self.config.github_api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request)
    }

    fn send(&self, request: RequestBuilder, url: &str, timeout: Duration) -> Result<Response> {
        request
            .send()
            .map_err(|e| map_request_error(e, url, timeout))
    }
}

impl RemoteRepository for GithubClient {
    #[instrument(skip(self))]
    fn list_release_assets(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseAsset>> {
        let url = format!(
            "{}?per_page={}",
            self.config.releases_api_url(owner, repo),
            RELEASES_PER_PAGE
        );
        debug!("Listing releases from {}", url);
        let response = self.send(self.api_request(&url)?, &url, self.config.api_timeout)?;
        let body = check_status(response, &url)?
            .text()
            .map_err(|e| map_request_error(e, &url, self.config.api_timeout))?;
        let assets = parse_release_assets(&body)?;
        debug!("{}/{} publishes {} release assets", owner, repo, assets.len());
        Ok(assets)
    }

    #[instrument(skip(self))]
    fn fetch_manifest(&self, owner: &str, repo: &str) -> Result<Option<String>> {
        let url = self.config.manifest_url(owner, repo);
        let timeout = self.config.manifest_timeout;
        let request = self.client()?.get(&url).timeout(timeout);
        let response = self.send(request, &url, timeout)?;

        match response.status() {
            status if status.is_success() => {
                let text = response
                    .text()
                    .map_err(|e| map_request_error(e, &url, timeout))?;
                Ok(Some(text))
            }
            StatusCode::NOT_FOUND => {
                debug!("No manifest at {}", url);
                Ok(None)
            }
            status => {
                warn!("Manifest request to {} answered {}", url, status);
                Err(status_error(status, &url))
            }
        }
    }

    #[instrument(skip(self))]
    fn fetch_bytes(&self, url: &str) -> Result<RemoteStream> {
        validate_url(url)?;
        let timeout = self.config.download_timeout;
        let request = self.client()?.get(url).timeout(timeout);
        let response = check_status(self.send(request, url, timeout)?, url)?;
        let content_length = response.content_length();
        debug!("Streaming {} ({:?} bytes)", url, content_length);
        Ok(RemoteStream {
            reader: Box::new(response),
            content_length,
        })
    }

    fn releases_page_url(&self, owner: &str, repo: &str) -> String {
        self.config.releases_page_url(owner, repo)
    }
}

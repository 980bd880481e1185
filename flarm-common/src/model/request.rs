use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlarmError, Result};

/// What the user asked to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallRequest {
    /// A repository reached through `<scheme>://owner.repo`.
    Remote { owner: String, repo: String },
    /// A package file already on disk.
    Local { path: PathBuf },
}

impl InstallRequest {
    /// Classifies a command-line argument or handler invocation.
    ///
    /// Anything starting with `<scheme>:` is a repository link. Otherwise the
    /// argument must name a package file, either by its extension or by
    /// existing on disk.
    pub fn parse(input: &str, scheme: &str, extension: &str) -> Result<Self> {
        let input = input.trim();
        if has_scheme(input, scheme) {
            let (owner, repo) = parse_package_uri(input, scheme)?;
            return Ok(InstallRequest::Remote { owner, repo });
        }

        let path = PathBuf::from(input);
        if has_package_extension(&path, extension) || path.is_file() {
            return Ok(InstallRequest::Local { path });
        }

        Err(FlarmError::InvalidRequest(format!(
            "'{input}' is neither a {scheme}:// link nor a .{extension} package"
        )))
    }

    /// Name executables and launchers are looked up by.
    pub fn short_name(&self) -> String {
        match self {
            InstallRequest::Remote { repo, .. } => repo.clone(),
            InstallRequest::Local { path } => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, InstallRequest::Local { .. })
    }

    /// Rebuilds the link that reproduces this request.
    pub fn share_link(&self, scheme: &str) -> Option<String> {
        match self {
            InstallRequest::Remote { owner, repo } => Some(format!("{scheme}://{owner}.{repo}")),
            InstallRequest::Local { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            InstallRequest::Remote { owner, repo } => format!("{owner}/{repo}"),
            InstallRequest::Local { path } => path.display().to_string(),
        }
    }
}

fn has_scheme(input: &str, scheme: &str) -> bool {
    input
        .get(..scheme.len() + 1)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&format!("{scheme}:")))
}

fn has_package_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Splits `<scheme>://owner.repo` into owner and repository name.
///
/// The owner is the first dot-separated token; the repository is the rest
/// joined back with dots, so `alice.my.repo` yields `("alice", "my.repo")`.
pub fn parse_package_uri(uri: &str, scheme: &str) -> Result<(String, String)> {
    let invalid = || {
        FlarmError::InvalidRequest(format!(
            "Invalid link '{uri}': must be {scheme}://username.repo"
        ))
    };

    if !has_scheme(uri, scheme) {
        return Err(invalid());
    }
    let rest = &uri[scheme.len() + 1..];
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let parts: Vec<&str> = rest.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|part| part.is_empty()) {
        return Err(invalid());
    }
    let allowed = |part: &&str| {
        part.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };
    if !parts.iter().all(allowed) {
        return Err(invalid());
    }

    Ok((parts[0].to_string(), parts[1..].join(".")))
}

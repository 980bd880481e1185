// flarm/src/cli/info.rs
use std::fs;

use clap::Args;
use colored::Colorize;
use flarm_common::config::Config;
use flarm_common::error::Result;
use flarm_common::model::{InstallRequest, ManifestField};
use flarm_core::manifest::parse_manifest;
use serde_json::json;

use crate::cli::{locate, parse_request};

#[derive(Args, Debug)]
pub struct Info {
    /// A flarmstore://owner.repo link or a path to an .iflapp package
    pub request: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let request = parse_request(&self.request, config)?;
        let located = locate(&request, config).await?;

        let share_link = request.share_link(&config.scheme);
        let repository_page = match &request {
            InstallRequest::Remote { owner, repo } => {
                Some(config.repository_page_url(owner, repo))
            }
            InstallRequest::Local { .. } => None,
        };
        let manifest = located.as_ref().and_then(|found| {
            fs::read_to_string(found.installed.path.join(&config.manifest_file_name))
                .ok()
                .map(|text| parse_manifest(&text))
        });

        if self.json {
            let fields = manifest.as_ref().map(|m| {
                ManifestField::ALL
                    .iter()
                    .filter_map(|field| m.get(*field).map(|v| (field.tag().to_string(), json!(v))))
                    .collect::<serde_json::Map<_, _>>()
            });
            let value = json!({
                "request": request.label(),
                "installed": located.is_some(),
                "install": located.as_ref().map(|found| &found.installed),
                "manifest": fields,
                "share_link": share_link,
                "repository_page": repository_page,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        match &located {
            Some(found) => {
                println!("{}", found.title().green().bold());
                println!("{:<12} {}", "Installed:".bold(), found.installed.path.display());
                if let Some(identity) = &found.installed.identity {
                    println!("{:<12} {}", "Publisher:".bold(), identity.publisher);
                    println!("{:<12} {}", "Version:".bold(), identity.version);
                    println!("{:<12} {}", "Platform:".bold(), identity.platform);
                }
                if let Some(author) = manifest.as_ref().and_then(|m| m.get(ManifestField::Author)) {
                    println!("{:<12} {}", "Author:".bold(), author);
                }
            }
            None => println!("{} is {}", request.label().cyan(), "not installed".yellow()),
        }
        if let Some(link) = share_link {
            println!("{:<12} {}", "Share:".bold(), link);
        }
        if let Some(page) = repository_page {
            println!("{:<12} {}", "Repository:".bold(), page);
        }
        Ok(())
    }
}

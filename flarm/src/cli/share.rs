// flarm/src/cli/share.rs
use clap::Args;
use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::InstallRequest;

use crate::cli::parse_request;

#[derive(Args, Debug)]
pub struct Share {
    /// A flarmstore://owner.repo link
    #[arg(required = true)]
    pub request: String,

    /// Print the repository web page instead of the install link
    #[arg(long)]
    pub web: bool,
}

impl Share {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match parse_request(&self.request, config)? {
            InstallRequest::Remote { owner, repo } if self.web => {
                println!("{}", config.repository_page_url(&owner, &repo));
                Ok(())
            }
            request @ InstallRequest::Remote { .. } => {
                // Remote requests always rebuild a link.
                let link = request.share_link(&config.scheme).unwrap_or_default();
                println!("{link}");
                Ok(())
            }
            InstallRequest::Local { path } => Err(FlarmError::InvalidRequest(format!(
                "{} is a local package; only repository links can be shared",
                path.display()
            ))),
        }
    }
}

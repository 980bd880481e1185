// flarm/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser, Subcommand};
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::InstallRequest;
use flarm_common::Config;
use flarm_core::pipeline::{locate_installation, LocatedInstall, Reporter};
use flarm_net::GithubClient;

pub mod info;
pub mod install;
pub mod list;
pub mod run;
pub mod share;
pub mod status;
pub mod uninstall;

use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::run::Run;
use crate::cli::share::Share;
use crate::cli::uninstall::Uninstall;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "flarm", bin_name = "flarm")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Install(InstallArgs),
    Uninstall(Uninstall),
    Info(Info),
    List(List),
    Run(Run),
    Share(Share),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Uninstall(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Run(command) => command.run(config).await,
            Self::Share(command) => command.run(config).await,
        }
    }
}

pub(crate) fn parse_request(input: &str, config: &Config) -> Result<InstallRequest> {
    InstallRequest::parse(input, &config.scheme, &config.package_extension)
}

/// Finds the installation a link or package file refers to.
///
/// Remote lookups block on the network, so they run on the blocking pool
/// together with the client they use.
pub(crate) async fn locate(
    request: &InstallRequest,
    config: &Config,
) -> Result<Option<LocatedInstall>> {
    let request = request.clone();
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let client = GithubClient::new(&config);
        locate_installation(&request, &config, &client, &Reporter::silent())
    })
    .await
    .map_err(|e| FlarmError::Generic(format!("Lookup task failed: {e}")))?
}

pub(crate) async fn locate_or_fail(input: &str, config: &Config) -> Result<LocatedInstall> {
    let request = parse_request(input, config)?;
    locate(&request, config).await?.ok_or_else(|| {
        FlarmError::NotFound(format!("{} is not installed", request.label()))
    })
}

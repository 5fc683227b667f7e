// aurs/src/cli.rs
//! Defines the command-line argument structure using clap.
use aurs_common::error::Result;
use aurs_common::Config;
use clap::{ArgAction, Parser, Subcommand};

pub mod info;
pub mod install;
pub mod prompt;
pub mod search;
pub mod status;
pub mod upgrade;

use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::search::Search;
use crate::cli::upgrade::UpgradeArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "aurs", bin_name = "aurs")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and install packages from the AUR (repository names go to pacman)
    Install(InstallArgs),
    /// Rebuild installed AUR packages that have a newer version
    Upgrade(UpgradeArgs),
    /// Search the AUR
    Search(Search),
    /// Show AUR package details
    Info(Info),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Upgrade(command) => command.run(config).await,
            Self::Search(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
        }
    }
}

// aurs/src/cli/upgrade.rs
use aurs_common::config::Config;
use aurs_common::error::Result;
use aurs_common::pipeline::PipelineFlags;
use clap::Args;

use crate::pipeline::runner::{self, CommandType};

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Also rebuild VCS (-git, -svn, ...) packages whose upstream may have moved
    #[arg(long)]
    pub devel: bool,

    #[arg(long)]
    pub noconfirm: bool,

    #[arg(long)]
    pub strict: bool,

    #[arg(long)]
    pub nocheck: bool,
}

impl UpgradeArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let flags = PipelineFlags {
            // Devel packages whose recorded revision still matches are skipped.
            needed: true,
            noconfirm: self.noconfirm,
            strict: self.strict,
            nocheck: self.nocheck,
            devel: self.devel,
        };
        runner::run_pipeline(&[], CommandType::Upgrade, config, flags).await
    }
}

// aurs/src/cli/install.rs
use aurs_common::config::Config;
use aurs_common::error::Result;
use aurs_common::pipeline::PipelineFlags;
use clap::Args;
use tracing::instrument;

use crate::pipeline::runner::{self, CommandType};

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[arg(required = true)]
    pub names: Vec<String>,

    #[arg(long, help = "Skip packages that are already installed at the same version")]
    pub needed: bool,
    #[arg(long, help = "Never ask for confirmation")]
    pub noconfirm: bool,
    #[arg(long, help = "Stop at the first package that fails to build")]
    pub strict: bool,
    #[arg(long, help = "Do not run check() and ignore checkdepends")]
    pub nocheck: bool,
}

impl InstallArgs {
    pub fn flags(&self) -> PipelineFlags {
        PipelineFlags {
            needed: self.needed,
            noconfirm: self.noconfirm,
            strict: self.strict,
            nocheck: self.nocheck,
            devel: false,
        }
    }

    #[instrument(skip(self, config), fields(targets = ?self.names))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        runner::run_pipeline(&self.names, CommandType::Install, config, self.flags()).await
    }
}

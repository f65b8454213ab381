use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use quorum_engine::EXAMPLE_CONFIG;

use super::output::emit;

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Write the example to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitConfigArgs) -> Result<()> {
    if let Some(ref path) = args.output {
        if path.exists() && !args.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
    }
    emit(EXAMPLE_CONFIG, args.output.as_deref())
}

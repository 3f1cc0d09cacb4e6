//! Root CLI structure for zipdelta

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "zipdelta")]
#[command(about = "Generate and apply entry-granular patches for ZIP archives", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a patch that transforms an old archive into a new one
    Generate(GenerateArgs),

    /// Apply a patch to an old archive to rebuild the new one
    Apply(ApplyArgs),

    /// Summarize the directives of a patch file
    Info(InfoArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Path to the old archive
    pub old: PathBuf,

    /// Path to the new archive
    pub new: PathBuf,

    /// Path to write the patch file
    pub patch: PathBuf,

    /// Skip render verification of entry reconstructions
    #[arg(long)]
    pub no_verify: bool,

    /// Disable content-based rename detection
    #[arg(long)]
    pub no_renames: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the old archive
    pub old: PathBuf,

    /// Path to the patch file
    pub patch: PathBuf,

    /// Path to write the rebuilt archive
    pub new: PathBuf,

    /// Skip CRC verification of reconstructed entry contents
    #[arg(long)]
    pub no_crc_check: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Path to the patch file
    pub patch: PathBuf,
}

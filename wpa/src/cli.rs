// wpa/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use wpa_common::config::Config;
use wpa_common::error::Result;
use wpa_core::ReferenceSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "wpa", bin_name = "wpa")]
pub struct CliArgs {
    /// Root of the WordPress installation to analyse
    #[arg(value_name = "WORDPRESS_PATH", required_unless_present = "teardown")]
    pub wordpress_path: Option<PathBuf>,

    /// Compare against this installation instead of downloading a clean copy
    #[arg(value_name = "OTHER_WORDPRESS_PATH", conflicts_with = "with_version")]
    pub other_wordpress_path: Option<PathBuf>,

    /// Download this WordPress version instead of the one the install declares
    #[arg(short = 'w', long = "with-version", value_name = "VERSION")]
    pub with_version: Option<String>,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Delete the scratch directory after a successful analysis
    #[arg(short = 't', long = "tidy-up")]
    pub tidy_up: bool,

    /// Only delete the scratch directory, then exit
    #[arg(long, conflicts_with_all = ["wordpress_path", "tidy_up", "reuse_scratch"])]
    pub teardown: bool,

    /// Where archives are downloaded and the reference tree is built
    #[arg(long, value_name = "PATH")]
    pub scratch_dir: Option<PathBuf>,

    /// Build over an existing scratch directory, reusing downloaded archives
    #[arg(long)]
    pub reuse_scratch: bool,

    /// Concurrent registry lookups and downloads
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the report as JSON instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Extension flagged inside the uploads directory (repeatable, replaces the defaults)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Extra path prefix left out of the comparison (repeatable)
    #[arg(long = "ignore", value_name = "PREFIX")]
    pub ignore: Vec<String>,
}

impl CliArgs {
    /// Layers the flags over the loaded configuration.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        if self.reuse_scratch {
            config.reuse_scratch = true;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_downloads = jobs;
        }
        if !self.extensions.is_empty() {
            config.script_extensions = self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }
        config.ignore_prefixes.extend(self.ignore.iter().cloned());
        config.validate()
    }

    pub fn reference_source(&self) -> ReferenceSource {
        match &self.other_wordpress_path {
            Some(other) => ReferenceSource::Existing(other.clone()),
            None => ReferenceSource::Download {
                version_override: self.with_version.clone(),
            },
        }
    }
}

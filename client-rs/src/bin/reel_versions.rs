//! Version manifest maintenance
//!
//! Usage:
//!   reel-versions --manifest videos.json list
//!   reel-versions set airplane.mp4 1.2.4
//!   reel-versions increment-all
//!   reel-versions add newvideo.mp4 --version 1.0.0
//!   reel-versions generate-hashes --public-dir ./public

use clap::{Parser, Subcommand};
use reelcache_client::{ManifestError, VersionManifest};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "reel-versions", about = "Manage video versions for cache busting")]
struct Cli {
    /// Manifest file; created from the built-in catalogue if missing
    #[arg(long, short, default_value = "videos.json", env = "REELCACHE_MANIFEST")]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all current video versions
    List,
    /// Set the version of a registered video
    Set { video: String, version: String },
    /// Increment the patch version of every video
    IncrementAll,
    /// Register a new video
    Add {
        video: String,
        #[arg(long, default_value = "1.0.0")]
        version: String,
    },
    /// Compute content-hash filenames from the files on disk
    GenerateHashes {
        #[arg(long, default_value = "./public")]
        public_dir: PathBuf,
    },
}

fn load_or_builtin(path: &Path) -> Result<VersionManifest, ManifestError> {
    if path.exists() {
        VersionManifest::load(path)
    } else {
        Ok(VersionManifest::builtin())
    }
}

fn run(cli: Cli) -> Result<(), ManifestError> {
    let mut manifest = load_or_builtin(&cli.manifest)?;

    match cli.command {
        Command::List => {
            println!("\n📹 Current Video Versions:");
            for (video, version) in &manifest.versions {
                let hashed = manifest.hashes.get(video).map(String::as_str).unwrap_or("-");
                println!("{:<20} v{:<10} {}", video, version, hashed);
            }
            return Ok(());
        }
        Command::Set { video, version } => {
            let old = manifest.set_version(&video, &version)?;
            println!("✅ Updated {}: v{} → v{}", video, old, version);
        }
        Command::IncrementAll => {
            println!("✅ Incremented all video versions:");
            for (video, old, new) in manifest.increment_all() {
                println!("  {}: v{} → v{}", video, old, new);
            }
        }
        Command::Add { video, version } => {
            manifest.add_video(&video, &version)?;
            println!("✅ Added new video: {} v{}", video, version);
        }
        Command::GenerateHashes { public_dir } => {
            let hashed = manifest.generate_hashes(&public_dir)?;
            for video in &hashed {
                println!("{} → {}", video, manifest.hashes[video]);
            }
            println!("🔧 Hashed {} of {} videos", hashed.len(), manifest.versions.len());
        }
    }

    manifest.save(&cli.manifest)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

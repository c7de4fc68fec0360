// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use satispress::auth::{Capability, User};
use satispress::hash::ChecksumAlgorithm;
use satispress::repository::Criteria;
use satispress::storage::WriterSender;
use satispress::{App, PackageBuilder, PackageRepository, PackageType, SatispressConfig, VersionParser};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "satispress")]
#[command(author, version, about = "Private Composer repository for WordPress plugins and themes", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    #[cfg(feature = "server")]
    Serve,
    /// Print packages.json as an administrator would see it
    Index,
    /// Archive one release of an installed package
    Archive {
        /// Package type (plugin, theme)
        package_type: PackageType,
        /// Package slug
        slug: String,
        /// Version to archive (default: the installed version)
        #[arg(long)]
        version: Option<String>,
    },
    /// Archive the installed release of every whitelisted package
    ArchiveAll,
    /// List archived releases of a package
    Releases {
        package_type: PackageType,
        slug: String,
    },
    /// Normalize a version string the way Composer does
    Normalize {
        version: String,
        /// Treat the input as a branch name
        #[arg(long)]
        branch: bool,
    },
    /// Manage the whitelist
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommands,
    },
    /// Write a release artifact to a file
    Send {
        package_type: PackageType,
        slug: String,
        version: String,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum WhitelistCommands {
    /// Whitelist a plugin basename or theme slug
    Add { package_type: PackageType, id: String },
    /// Remove a plugin basename or theme slug
    Remove { package_type: PackageType, id: String },
    /// Show whitelisted entries
    List,
}

/// Operator running the CLI; sees and downloads everything
fn admin() -> User {
    User::new(
        "cli",
        [
            Capability::ViewPackages,
            Capability::DownloadPackages,
            Capability::ManageOptions,
        ],
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SatispressConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        #[cfg(feature = "server")]
        Some(Commands::Serve) => {
            use satispress::server::{ServerState, run_server};
            use std::sync::Arc;

            let state = Arc::new(ServerState::from_config(&config)?);
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(run_server(state))
        }
        Some(Commands::Index) => {
            let app = App::from_config(&config, Vec::new())?;
            let index = app.index(&admin())?;
            println!("{}", serde_json::to_string_pretty(&index)?);
            Ok(())
        }
        Some(Commands::Archive {
            package_type,
            slug,
            version,
        }) => {
            let app = App::from_config(&config, Vec::new())?;
            let package = app
                .installed
                .first_where(&Criteria::package(package_type, &slug))?
                .with_context(|| format!("{} {} is not installed", package_type, slug))?;

            let release = match version {
                Some(version) => package.get_release(&version)?,
                None => package.installed_release()?,
            };
            let release = app.manager.archive(&release)?;
            println!("Archived {}", release.file_path());
            Ok(())
        }
        Some(Commands::ArchiveAll) => {
            let app = App::from_config(&config, Vec::new())?;
            let report = app.package_archiver().archive_installed()?;

            for id in &report.archived {
                println!("  archived  {}", id);
            }
            for id in &report.skipped {
                println!("  present   {}", id);
            }
            for (id, reason) in &report.failed {
                println!("  FAILED    {}: {}", id, reason);
            }

            if !report.is_success() {
                anyhow::bail!("{} releases failed to archive", report.failed.len());
            }
            Ok(())
        }
        Some(Commands::Releases { package_type, slug }) => {
            let app = App::from_config(&config, Vec::new())?;
            let package = match app.installed.first_where(&Criteria::package(package_type, &slug))? {
                Some(package) => package,
                None => PackageBuilder::new(package_type).slug(&slug).build(),
            };

            let releases = app.manager.all(&package)?;
            if releases.is_empty() {
                println!("No archived releases for {} {}", package_type, slug);
            }
            let parser = VersionParser::new();
            for (version, release) in &releases {
                let sha1 = app.manager.checksum(ChecksumAlgorithm::Sha1, release)?;
                let stability = parser.parse_stability(version);
                println!("{:<20} {:<6} {}  {}", version, stability, sha1, release.file_path());
            }
            if let Some(url) = package.latest_download_url(&config.public_url()?) {
                println!("latest: {}", url);
            }
            Ok(())
        }
        Some(Commands::Normalize { version, branch }) => {
            let parser = VersionParser::new();
            let normalized = if branch {
                parser.normalize_branch(&version)?
            } else {
                parser.normalize(&version)?
            };
            println!("{}", normalized);
            println!("stability: {}", parser.parse_stability(&version));
            Ok(())
        }
        Some(Commands::Whitelist { command }) => {
            let app = App::from_config(&config, Vec::new())?;
            match command {
                WhitelistCommands::Add { package_type, id } => {
                    if !app.whitelist.add(package_type, &id)? {
                        println!("{} {} is already whitelisted", package_type, id);
                    }
                }
                WhitelistCommands::Remove { package_type, id } => {
                    if !app.whitelist.remove(package_type, &id)? {
                        println!("{} {} was not whitelisted", package_type, id);
                    }
                }
                WhitelistCommands::List => {
                    for package_type in [PackageType::Plugin, PackageType::Theme] {
                        for id in app.whitelist.entries(package_type)? {
                            println!("{:<8} {}", package_type, id);
                        }
                    }
                }
            }
            Ok(())
        }
        Some(Commands::Send {
            package_type,
            slug,
            version,
            output,
        }) => {
            let app = App::from_config(&config, Vec::new())?;
            let package = app
                .find_package(package_type, &slug)?
                .with_context(|| format!("{} {} is not published", package_type, slug))?;
            let release = app.manager.archive(&package.get_release(&version)?)?;

            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let mut sender = WriterSender::new(BufWriter::new(file));
            app.manager.send(&release, &mut sender)?;

            info!("Wrote {} to {}", release.file(), output.display());
            Ok(())
        }
        None => {
            println!("SatisPress v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'satispress --help' for usage information");
            Ok(())
        }
    }
}

//! Nodepack - Node.js build resolution CLI
//!
//! The `nodepack` command resolves and provisions a Node.js application.
//!
//! ## Commands
//!
//! - `build`: Resolve the runtime, install dependencies, and write build metadata
//! - `detect`: Show the package manager and entrypoint without installing anything
//! - `versions`: List runtime versions published by the distribution server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use node_catalog::{HttpCatalog, HttpRuntimeInstaller, RuntimeInstaller, VersionCatalog};
use nodepack_core::installer::CommandRunner;
use nodepack_core::manifest::Manifest;
use nodepack_core::{
    detect, resolve_entrypoint, BuildConfig, BuildPipeline, InstallPlan, TokioCommandRunner,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "nodepack")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Node.js runtime and package-manager resolution for container builds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an application: runtime, dependencies, metadata
    Build {
        /// Application source directory
        #[arg(long, default_value = ".")]
        app_dir: PathBuf,

        /// Directory receiving the runtime layer
        #[arg(long, env = "NODEPACK_LAYERS_DIR", default_value = ".nodepack/layers")]
        layers_dir: PathBuf,

        /// Write the build document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolve only; install neither the runtime nor dependencies
        #[arg(long)]
        skip_install: bool,
    },

    /// Show the detected package manager and entrypoint
    Detect {
        /// Application source directory
        #[arg(long, default_value = ".")]
        app_dir: PathBuf,
    },

    /// List available runtime versions
    Versions {
        /// Only list LTS releases
        #[arg(long)]
        lts: bool,

        /// Maximum number of versions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    nodepack_core::telemetry::init_tracing(
        cli.json || nodepack_core::telemetry::json_requested(),
        level,
    );

    if let Err(e) = run(cli.command).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            app_dir,
            layers_dir,
            output,
            skip_install,
        } => {
            let catalog = HttpCatalog::from_env().context("Failed to create catalog client")?;
            let runtime =
                HttpRuntimeInstaller::from_env().context("Failed to create runtime installer")?;
            let config = BuildConfig::from_env();
            cmd_build(
                &catalog,
                &runtime,
                &TokioCommandRunner,
                config,
                &app_dir,
                &layers_dir,
                output.as_deref(),
                skip_install,
            )
            .await
        }
        Commands::Detect { app_dir } => cmd_detect(&BuildConfig::from_env(), &app_dir),
        Commands::Versions { lts, limit } => {
            let catalog = HttpCatalog::from_env().context("Failed to create catalog client")?;
            cmd_versions(&catalog, lts, limit).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_build(
    catalog: &dyn VersionCatalog,
    runtime: &dyn RuntimeInstaller,
    runner: &dyn CommandRunner,
    config: BuildConfig,
    app_dir: &Path,
    layers_dir: &Path,
    output: Option<&Path>,
    skip_install: bool,
) -> Result<()> {
    std::fs::create_dir_all(layers_dir)
        .with_context(|| format!("Failed to create layers dir {}", layers_dir.display()))?;

    let outcome = BuildPipeline::new(catalog, runtime, runner, config)
        .with_skip_install(skip_install)
        .run(app_dir, layers_dir)
        .await?;

    let document = serde_json::to_string_pretty(&outcome.to_json())?;
    match output {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Build metadata written to {}", path.display());
        }
        None => println!("{}", document),
    }
    Ok(())
}

fn cmd_detect(config: &BuildConfig, app_dir: &Path) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&detect_document(config, app_dir)?)?);
    Ok(())
}

fn detect_document(config: &BuildConfig, app_dir: &Path) -> Result<serde_json::Value> {
    let manifest = Manifest::load(app_dir)?;
    let detection = detect(app_dir, manifest.as_ref(), config.entrypoint.is_some())?;
    let entrypoint = resolve_entrypoint(
        config.entrypoint.as_deref(),
        manifest.as_ref(),
        detection.as_ref().map(|d| d.kind),
        app_dir,
    )?;
    let plan = detection
        .as_ref()
        .map(|d| InstallPlan::new(d, config.devmode));

    Ok(json!({
        "package_manager": detection,
        "install_plan": plan,
        "entrypoint": entrypoint,
        "devmode": config.devmode,
    }))
}

async fn cmd_versions(catalog: &dyn VersionCatalog, lts: bool, limit: usize) -> Result<()> {
    for line in version_lines(catalog, lts, limit).await? {
        println!("{}", line);
    }
    Ok(())
}

async fn version_lines(catalog: &dyn VersionCatalog, lts: bool, limit: usize) -> Result<Vec<String>> {
    let entries = catalog
        .list_versions()
        .await
        .context("Failed to list runtime versions")?;

    Ok(entries
        .iter()
        .filter(|e| !lts || e.is_lts())
        .take(limit)
        .map(|e| match &e.lts {
            Some(codename) => format!("{}\t(LTS: {})", e.version, codename),
            None => e.version.to_string(),
        })
        .collect())
}

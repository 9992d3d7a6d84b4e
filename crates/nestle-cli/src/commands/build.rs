//! Build command - build a project's artifacts from nestle.toml

use anyhow::{Context, Result};
use nestle_build::{topological_order, BuildReport, Builder, Project};
use nestle_config::{Config, ConfigLoader};
use std::path::PathBuf;
use tracing::info;

/// Build command arguments
#[derive(Debug, Default)]
pub struct BuildArgs {
    /// Project directory (defaults to current directory)
    pub project_dir: Option<PathBuf>,
    /// Working directory override
    pub work_dir: Option<PathBuf>,
    /// JSON output
    pub json: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let config = load_config(args.project_dir)?;
    let project = Project::from_config(&config).context("Failed to load artifacts")?;
    let work_dir = args
        .work_dir
        .unwrap_or_else(|| config.resolved_work_dir());

    info!(project = project.name(), work_dir = %work_dir.display(), "building");
    let report = Builder::new(&project, &work_dir)
        .build()
        .context("Build failed")?;

    if args.json {
        println!("{}", report.to_json().context("Failed to encode build report")?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

/// Print artifact ids in build order, one per line
pub fn order(project_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(project_dir)?;
    let project = Project::from_config(&config).context("Failed to load artifacts")?;
    let ordered = topological_order(project.artifacts()).context("Invalid artifact graph")?;
    for artifact in ordered {
        println!("{}", artifact.id());
    }
    Ok(())
}

fn load_config(project_dir: Option<PathBuf>) -> Result<Config> {
    let start = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    ConfigLoader::new()
        .load_from_directory(&start)
        .with_context(|| format!("Failed to load nestle.toml from {}", start.display()))
}

fn print_summary(report: &BuildReport) {
    println!("Built {} in {}ms", report.project, report.elapsed_ms);
    for artifact in &report.artifacts {
        let signed = if artifact.signed { " (signed)" } else { "" };
        println!(
            "  {:<16} {:<18} {} entries  {}{}",
            artifact.id,
            artifact.kind.to_string(),
            artifact.entries,
            artifact.output.display(),
            signed
        );
    }
}

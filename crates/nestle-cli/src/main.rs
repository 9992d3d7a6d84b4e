use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

/// Build nested archives and look inside them.
///
/// Reads the artifact graph from nestle.toml, builds every artifact in
/// dependency order and resolves addresses of the form
/// `outer.jar!/BOOT-INF/lib/inner.jar!/a/B.class` without extracting anything.
///
/// EXAMPLES:
///     nestle build                          Build the project in the current directory
///     nestle order                          Print the build order
///     nestle ls target/nestle/build/app.jar List entries and nested members
///     nestle cat 'app.jar!/BOOT-INF/lib/lib.jar!/a/A.class'
///     nestle find app.jar com.example.Main  Locate a unit the way the launcher would
///
/// ENVIRONMENT VARIABLES:
///     NESTLE_LOG        Log filter (default: info)
///     NESTLE_WORK_DIR   Working directory override
///     NESTLE_JSON       Set to 'true' for JSON build reports
#[derive(Parser)]
#[command(name = "nestle")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every artifact of a project
    ///
    /// EXAMPLES:
    ///     nestle build                    Build from the current directory
    ///     nestle build --dir demo --json  Build another project, JSON report
    #[command(visible_alias = "b")]
    Build {
        /// Project directory (searched upwards for nestle.toml)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,
        /// Working directory holding build/ and playground/
        #[arg(long, short = 'w')]
        work_dir: Option<PathBuf>,
        /// Print the build report as JSON
        #[arg(long, env = "NESTLE_JSON")]
        json: bool,
    },

    /// Print the order artifacts would be built in
    Order {
        /// Project directory (searched upwards for nestle.toml)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,
    },

    /// Write the bytes at a nested address to stdout
    Cat {
        /// `outer!/segment[!/member]`
        address: String,
    },

    /// List archive entries and the members of nested archives
    Ls {
        /// Outer archive
        archive: PathBuf,
    },

    /// Resolve a unit through a fat archive's search paths
    Find {
        /// Outer archive
        archive: PathBuf,
        /// Qualified unit name, e.g. com.example.Main
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Build {
            dir,
            work_dir,
            json,
        } => commands::build::run(commands::build::BuildArgs {
            project_dir: dir,
            work_dir,
            json,
        }),
        Commands::Order { dir } => commands::build::order(dir),
        Commands::Cat { address } => commands::inspect::cat(&address),
        Commands::Ls { archive } => commands::inspect::ls(&archive),
        Commands::Find { archive, name } => commands::inspect::find(&archive, &name),
    }
}

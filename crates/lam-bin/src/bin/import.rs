//! Graph importer: reads a GraphML design, validates it, and re-exports it
//! in the native dialect (a quick structural check of the front end).

use anyhow::{Context, Result};
use clap::Parser;
use laminar::{configure_logging, exit_with, CommonArgs};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "laminar-import", version, about = "Import and re-export a dataflow design")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    /// Also run full design validation after import.
    #[arg(long, default_value_t = true)]
    validate: bool,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = configure_logging("laminar-import")?;

    let dialect = cli.common.dialect()?;
    let mut design = core_graphml::import_design(&cli.common.input, dialect)
        .with_context(|| format!("importing {}", cli.common.input.display()))?;

    if cli.validate {
        design.validate().context("imported design failed validation")?;
    }

    design.assign_node_ids();
    design.assign_arc_ids();
    std::fs::create_dir_all(&cli.common.output_dir)?;
    let out = cli.common.output_dir.join(format!("{}.graphml", cli.common.design_name));
    core_graphml::export_design(&design, &out)
        .with_context(|| format!("exporting {}", out.display()))?;

    info!(
        target: "import",
        nodes = design.node_count(),
        arcs = design.arc_count(),
        out = %out.display(),
        "import_complete"
    );
    println!(
        "imported {} nodes / {} arcs -> {}",
        design.node_count(),
        design.arc_count(),
        out.display()
    );
    Ok(())
}

fn main() {
    exit_with(run());
}

//! Single-threaded generator entry point.

use anyhow::{Context, Result};
use clap::Parser;
use laminar::{configure_logging, exit_with, CommonArgs};

#[derive(Parser, Debug)]
#[command(
    name = "laminar-singlethread",
    version,
    about = "Generate a single-threaded C implementation of a dataflow design"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    /// Emit strategy: bottomup | topological | topological-context.
    #[arg(long)]
    strategy: Option<String>,
    /// Scheduling tie-break heuristic: bfs | dfs | random.
    #[arg(long)]
    sched_heuristic: Option<String>,
    /// Random seed for the random heuristic.
    #[arg(long)]
    rand_seed: Option<u64>,
    /// Block size (samples per invocation).
    #[arg(long)]
    block_size: Option<usize>,
    /// Print the final schedule to stdout.
    #[arg(long, default_value_t = false)]
    print_schedule: bool,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = configure_logging("laminar-singlethread")?;

    let mut opts = core_flow::load_options(cli.common.config.as_deref(), &cli.common.input)?;
    if let Some(s) = &cli.strategy {
        opts.strategy = core_sched::SchedStrategy::parse(s)
            .with_context(|| format!("unknown strategy `{s}`"))?;
    }
    if let Some(h) = &cli.sched_heuristic {
        opts.heuristic = core_sched::SchedHeuristic::parse(h)
            .with_context(|| format!("unknown heuristic `{h}`"))?;
    }
    if let Some(seed) = cli.rand_seed {
        opts.rand_seed = seed;
    }
    if let Some(b) = cli.block_size {
        opts.block_size = b;
    }
    opts.print_schedule |= cli.print_schedule;

    let dialect = cli.common.dialect()?;
    let mut design = core_graphml::import_design(&cli.common.input, dialect)
        .with_context(|| format!("importing {}", cli.common.input.display()))?;

    let report = core_flow::single_threaded_flow(
        &mut design,
        &cli.common.design_name,
        &cli.common.output_dir,
        &opts,
    )?;
    println!(
        "emitted {} files to {}",
        report.emitted.len(),
        cli.common.output_dir.display()
    );
    Ok(())
}

fn main() {
    exit_with(run());
}

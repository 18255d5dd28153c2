//! Multi-threaded generator entry point.

use anyhow::{Context, Result};
use clap::Parser;
use laminar::{configure_logging, exit_with, CommonArgs};

#[derive(Parser, Debug)]
#[command(
    name = "laminar-multithread",
    version,
    about = "Generate a multi-threaded C implementation of a dataflow design"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    /// Scheduling tie-break heuristic: bfs | dfs | random.
    #[arg(long)]
    sched_heuristic: Option<String>,
    /// Random seed for the random heuristic.
    #[arg(long)]
    rand_seed: Option<u64>,
    /// Block size (samples moved per FIFO transaction).
    #[arg(long)]
    block_size: Option<usize>,
    /// Sub-block size (must divide the block size).
    #[arg(long)]
    sub_block_size: Option<usize>,
    /// FIFO capacity in blocks.
    #[arg(long)]
    fifo_length: Option<usize>,
    /// I/O boundary variant: const | pipe | socket | shmem.
    #[arg(long)]
    io_variant: Option<String>,
    /// Partition to CPU pinning, e.g. `0:2,1:3`.
    #[arg(long)]
    cpu_map: Option<String>,
    /// Emit telemetry helpers and rate reporting.
    #[arg(long, default_value_t = false)]
    telemetry: bool,
    /// Emit PAPI helpers.
    #[arg(long, default_value_t = false)]
    papi: bool,
    /// Ask for SCHED_FIFO at maximum priority in the generated scaffolding.
    #[arg(long, default_value_t = false)]
    realtime: bool,
    /// Double-buffer FIFO writes.
    #[arg(long, default_value_t = false)]
    double_buffer: bool,
    /// Print the final schedule to stdout.
    #[arg(long, default_value_t = false)]
    print_schedule: bool,
}

fn parse_cpu_map(s: &str) -> Result<Vec<(i32, usize)>> {
    s.split(',')
        .filter(|tok| !tok.trim().is_empty())
        .map(|tok| {
            let (part, cpu) = tok
                .split_once(':')
                .with_context(|| format!("bad cpu-map entry `{tok}` (want part:cpu)"))?;
            Ok((part.trim().parse()?, cpu.trim().parse()?))
        })
        .collect()
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = configure_logging("laminar-multithread")?;

    let mut opts = core_flow::load_options(cli.common.config.as_deref(), &cli.common.input)?;
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
    if let Some(b) = cli.sub_block_size {
        opts.sub_block_size = b;
    }
    if let Some(len) = cli.fifo_length {
        opts.fifo_length_blocks = len;
    }
    if let Some(v) = &cli.io_variant {
        opts.io_variant =
            core_emit::IoVariant::parse(v).with_context(|| format!("unknown I/O variant `{v}`"))?;
    }
    if let Some(map) = &cli.cpu_map {
        for (part, cpu) in parse_cpu_map(map)? {
            opts.cpu_map.insert(part, cpu);
        }
    }
    opts.telemetry |= cli.telemetry;
    opts.papi |= cli.papi;
    opts.realtime |= cli.realtime;
    opts.double_buffer |= cli.double_buffer;
    opts.print_schedule |= cli.print_schedule;
    if opts.block_size == 0
        || opts.sub_block_size == 0
        || opts.block_size % opts.sub_block_size != 0
    {
        anyhow::bail!(
            "sub-block size {} must divide block size {}",
            opts.sub_block_size,
            opts.block_size
        );
    }

    let dialect = cli.common.dialect()?;
    let mut design = core_graphml::import_design(&cli.common.input, dialect)
        .with_context(|| format!("importing {}", cli.common.input.display()))?;

    let report = core_flow::multi_threaded_flow(
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

//! Generator options.
//!
//! Options load from a `laminar.toml` next to the input graph (unknown keys
//! are ignored so the file can evolve), then CLI flags override individual
//! fields.  The parsed file is kept alongside the effective values.

use std::path::Path;

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

use core_emit::{IoVariant, MultiThreadEmitOptions};
use core_ir::{CompileError, FifoVariant, Result};
use core_mt::fifo_insert::FifoSpec;
use core_sched::{SchedHeuristic, SchedStrategy, TopologicalSortParams};

bitflags! {
    /// Debug GraphML dump checkpoints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DumpPoints: u8 {
        const PRE_BLOCKING  = 1 << 0;
        const POST_BLOCKING = 1 << 1;
        const POST_SCHED    = 1 << 2;
        const COMMUNICATION = 1 << 3;
        const COMMUNICATION_INIT_COND = 1 << 4;
    }
}

impl DumpPoints {
    pub fn parse_one(s: &str) -> Option<DumpPoints> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre-blocking" => Some(DumpPoints::PRE_BLOCKING),
            "post-blocking" => Some(DumpPoints::POST_BLOCKING),
            "post-scheduling" => Some(DumpPoints::POST_SCHED),
            "communication" => Some(DumpPoints::COMMUNICATION),
            "communication-init-cond" => Some(DumpPoints::COMMUNICATION_INIT_COND),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorSection {
    #[serde(default = "default_one")]
    pub block_size: usize,
    #[serde(default = "default_one")]
    pub sub_block_size: usize,
    #[serde(default)]
    pub dumps: Vec<String>,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        GeneratorSection {
            block_size: default_one(),
            sub_block_size: default_one(),
            dumps: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedSection {
    #[serde(default = "SchedSection::default_heuristic")]
    pub heuristic: String,
    #[serde(default)]
    pub rand_seed: u64,
    #[serde(default = "SchedSection::default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub print_schedule: bool,
}

impl SchedSection {
    fn default_heuristic() -> String {
        "bfs".to_string()
    }
    fn default_strategy() -> String {
        "topological-context".to_string()
    }
}

impl Default for SchedSection {
    fn default() -> Self {
        SchedSection {
            heuristic: Self::default_heuristic(),
            rand_seed: 0,
            strategy: Self::default_strategy(),
            print_schedule: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FifoSection {
    #[serde(default = "FifoSection::default_length")]
    pub length_blocks: usize,
    #[serde(default = "FifoSection::default_variant")]
    pub variant: String,
    #[serde(default = "default_true")]
    pub cached_indexes: bool,
    #[serde(default)]
    pub double_buffer: bool,
}

impl FifoSection {
    fn default_length() -> usize {
        16
    }
    fn default_variant() -> String {
        "lockless".to_string()
    }
}

impl Default for FifoSection {
    fn default() -> Self {
        FifoSection {
            length_blocks: Self::default_length(),
            variant: Self::default_variant(),
            cached_indexes: true,
            double_buffer: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IoSection {
    #[serde(default = "IoSection::default_variant")]
    pub variant: String,
    #[serde(default)]
    pub telemetry: bool,
    #[serde(default)]
    pub papi: bool,
    #[serde(default)]
    pub realtime: bool,
    /// Partition -> logical CPU pinning, keyed by the partition number.
    #[serde(default)]
    pub cpu_map: IndexMap<String, usize>,
}

impl IoSection {
    fn default_variant() -> String {
        "const".to_string()
    }
}

impl Default for IoSection {
    fn default() -> Self {
        IoSection {
            variant: Self::default_variant(),
            telemetry: false,
            papi: false,
            realtime: false,
            cpu_map: IndexMap::new(),
        }
    }
}

fn default_one() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Raw option file contents (tolerant of unknown keys).
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FlowConfig {
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub sched: SchedSection,
    #[serde(default)]
    pub fifo: FifoSection,
    #[serde(default)]
    pub io: IoSection,
}

/// Effective, validated flow options.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Original file text, when a file was found.
    pub raw: Option<String>,
    pub file: FlowConfig,
    pub block_size: usize,
    pub sub_block_size: usize,
    pub dumps: DumpPoints,
    pub heuristic: SchedHeuristic,
    pub rand_seed: u64,
    pub strategy: SchedStrategy,
    pub print_schedule: bool,
    pub fifo_length_blocks: usize,
    pub fifo_variant: FifoVariant,
    pub fifo_cached_indexes: bool,
    pub double_buffer: bool,
    pub io_variant: IoVariant,
    pub telemetry: bool,
    pub papi: bool,
    pub realtime: bool,
    pub cpu_map: IndexMap<i32, usize>,
}

impl Default for FlowOptions {
    fn default() -> Self {
        FlowOptions::from_config(FlowConfig::default(), None)
            .expect("default configuration is valid")
    }
}

impl FlowOptions {
    pub fn from_config(file: FlowConfig, raw: Option<String>) -> Result<FlowOptions> {
        let mut dumps = DumpPoints::empty();
        for name in &file.generator.dumps {
            let point = DumpPoints::parse_one(name).ok_or_else(|| {
                CompileError::Parse(format!("unknown dump checkpoint `{name}`"))
            })?;
            dumps |= point;
        }
        let heuristic = SchedHeuristic::parse(&file.sched.heuristic).ok_or_else(|| {
            CompileError::Parse(format!("unknown scheduling heuristic `{}`", file.sched.heuristic))
        })?;
        let strategy = SchedStrategy::parse(&file.sched.strategy).ok_or_else(|| {
            CompileError::Parse(format!("unknown emit strategy `{}`", file.sched.strategy))
        })?;
        let fifo_variant = match file.fifo.variant.trim() {
            "lockless" => FifoVariant::Lockless,
            "lockless_inplace" | "lockless-in-place" => FifoVariant::LocklessInPlace,
            other => {
                return Err(CompileError::Parse(format!("unknown FIFO variant `{other}`")));
            }
        };
        let io_variant = IoVariant::parse(&file.io.variant).ok_or_else(|| {
            CompileError::Parse(format!("unknown I/O variant `{}`", file.io.variant))
        })?;
        if file.generator.block_size == 0
            || file.generator.sub_block_size == 0
            || file.generator.block_size % file.generator.sub_block_size != 0
        {
            return Err(CompileError::Parse(format!(
                "sub-block size {} must divide block size {}",
                file.generator.sub_block_size, file.generator.block_size
            )));
        }
        let mut cpu_map = IndexMap::new();
        for (part, cpu) in &file.io.cpu_map {
            let part: i32 = part.parse().map_err(|_| {
                CompileError::Parse(format!("bad partition `{part}` in cpu_map"))
            })?;
            cpu_map.insert(part, *cpu);
        }

        Ok(FlowOptions {
            block_size: file.generator.block_size,
            sub_block_size: file.generator.sub_block_size,
            dumps,
            heuristic,
            rand_seed: file.sched.rand_seed,
            strategy,
            print_schedule: file.sched.print_schedule,
            fifo_length_blocks: file.fifo.length_blocks,
            fifo_variant,
            fifo_cached_indexes: file.fifo.cached_indexes,
            double_buffer: file.fifo.double_buffer,
            io_variant,
            telemetry: file.io.telemetry,
            papi: file.io.papi,
            realtime: file.io.realtime,
            cpu_map,
            raw,
            file,
        })
    }

    pub fn sort_params(&self) -> TopologicalSortParams {
        TopologicalSortParams { heuristic: self.heuristic, rand_seed: self.rand_seed }
    }

    pub fn fifo_spec(&self) -> FifoSpec {
        FifoSpec {
            variant: self.fifo_variant,
            length_blocks: self.fifo_length_blocks,
            block_size: self.block_size,
            sub_block_size: self.sub_block_size,
            cached_indexes: self.fifo_cached_indexes,
        }
    }

    pub fn emit_options(&self) -> MultiThreadEmitOptions {
        MultiThreadEmitOptions {
            io_variant: self.io_variant,
            block_len: self.block_size,
            sub_block_len: self.sub_block_size,
            telemetry: self.telemetry,
            papi: self.papi,
            double_buffer: self.double_buffer,
            realtime: self.realtime,
            cpu_map: self.cpu_map.clone(),
        }
    }
}

/// Load options from an explicit path or a `laminar.toml` next to the input.
/// A missing file yields the defaults.
pub fn load_options(explicit: Option<&Path>, input: &Path) -> Result<FlowOptions> {
    let candidate = explicit
        .map(|p| p.to_path_buf())
        .or_else(|| input.parent().map(|d| d.join("laminar.toml")));

    match candidate {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(&path)?;
            let file: FlowConfig = toml::from_str(&raw)
                .map_err(|e| CompileError::Parse(format!("bad options file: {e}")))?;
            info!(target: "flow.config", path = %path.display(), "options_loaded");
            FlowOptions::from_config(file, Some(raw))
        }
        _ => Ok(FlowOptions::default()),
    }
}

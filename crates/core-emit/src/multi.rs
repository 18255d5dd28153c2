//! Multi-threaded emitter.
//!
//! Per partition, emits a thread function that blocks on its input FIFOs,
//! runs the scheduled block loop, and publishes to its output FIFOs.  Also
//! emits the FIFO header, the I/O boundary thread for the selected variant,
//! a benchmark kernel and driver, the Makefile, the per-design parameters
//! header, and optional telemetry/PAPI helpers.

use indexmap::{IndexMap, IndexSet};
use tracing::info;

use core_ir::{
    node_ident, CodeQueue, Design, EmitState, NodeKey, NodeKind, Result, PARTITION_IO,
};

use crate::files::FileSink;
use crate::helpers;

/// Boundary-thread flavor for design I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoVariant {
    /// Drive inputs with constants; discard outputs.
    ConstantSource,
    /// Read/write POSIX pipes.
    Pipe,
    /// Read/write a TCP socket.
    Socket,
    /// Shared-memory FIFO against an external process.
    SharedMemory,
}

impl IoVariant {
    pub fn tag(self) -> &'static str {
        match self {
            IoVariant::ConstantSource => "const",
            IoVariant::Pipe => "pipe",
            IoVariant::Socket => "socket",
            IoVariant::SharedMemory => "shmem",
        }
    }

    pub fn parse(s: &str) -> Option<IoVariant> {
        match s.trim().to_ascii_lowercase().as_str() {
            "const" | "constant" => Some(IoVariant::ConstantSource),
            "pipe" => Some(IoVariant::Pipe),
            "socket" => Some(IoVariant::Socket),
            "shmem" | "sharedmemory" | "shared-memory" => Some(IoVariant::SharedMemory),
            _ => None,
        }
    }
}

/// Options controlling the multi-threaded emission.
#[derive(Debug, Clone)]
pub struct MultiThreadEmitOptions {
    pub io_variant: IoVariant,
    pub block_len: usize,
    pub sub_block_len: usize,
    /// Emit telemetry helper sources and rate-reporting hooks.
    pub telemetry: bool,
    /// Emit PAPI helper sources.
    pub papi: bool,
    /// Double-buffer FIFO writes.
    pub double_buffer: bool,
    /// Request SCHED_FIFO at maximum priority for worker threads.
    pub realtime: bool,
    /// Partition to logical-CPU pinning.
    pub cpu_map: IndexMap<i32, usize>,
}

impl Default for MultiThreadEmitOptions {
    fn default() -> Self {
        MultiThreadEmitOptions {
            io_variant: IoVariant::ConstantSource,
            block_len: 1,
            sub_block_len: 1,
            telemetry: false,
            papi: false,
            double_buffer: false,
            realtime: false,
            cpu_map: IndexMap::new(),
        }
    }
}

/// FIFOs grouped by the partitions they touch.
struct FifoPlan {
    all: Vec<NodeKey>,
    /// FIFOs read by each partition (consumer side).
    inputs_of: IndexMap<i32, Vec<NodeKey>>,
    /// FIFOs written by each partition (producer side).
    outputs_of: IndexMap<i32, Vec<NodeKey>>,
}

fn plan_fifos(design: &Design) -> FifoPlan {
    let mut plan = FifoPlan { all: Vec::new(), inputs_of: IndexMap::new(), outputs_of: IndexMap::new() };
    for key in design.node_keys() {
        if !matches!(design.node(key).kind, NodeKind::Fifo(_)) {
            continue;
        }
        plan.all.push(key);
        let src_part = design.node(key).partition;
        plan.outputs_of.entry(src_part).or_default().push(key);
        let dst_parts: IndexSet<i32> = design
            .out_arcs(key)
            .into_iter()
            .map(|a| design.node(design.arc(a).dst.node).partition)
            .collect();
        for p in dst_parts {
            plan.inputs_of.entry(p).or_default().push(key);
        }
    }
    plan
}

/// Compute partitions (excluding I/O) with at least one scheduled node.
fn compute_partitions(design: &Design) -> Vec<i32> {
    let mut parts: Vec<i32> = design
        .partitions()
        .into_iter()
        .filter(|p| *p != PARTITION_IO && *p >= 0)
        .collect();
    parts.sort_unstable();
    parts
}

/// Emit every multi-threaded artifact.  Returns the emitted file names.
pub fn emit_multi_threaded(
    design: &Design,
    name: &str,
    opts: &MultiThreadEmitOptions,
    sink: &FileSink,
) -> Result<Vec<String>> {
    let plan = plan_fifos(design);
    let partitions = compute_partitions(design);
    let mut files = Vec::new();

    let params_name = format!("{name}_parameters.h");
    sink.write(&params_name, &parameters_header(name, opts, &partitions))?;
    files.push(params_name);

    let header_name = format!("{name}.h");
    sink.write(&header_name, &fifo_header(design, name, &plan, &partitions)?)?;
    files.push(header_name);

    for &p in &partitions {
        let file = format!("{name}_partition{p}.c");
        sink.write(&file, &partition_source(design, name, p, opts, &plan)?)?;
        files.push(file);
    }

    let io_name = format!("{name}_io_{}.c", opts.io_variant.tag());
    sink.write(&io_name, &io_thread_source(design, name, opts, &plan)?)?;
    files.push(io_name);

    let kernel_h = format!("{name}_benchmark_kernel.h");
    let kernel_c = format!("{name}_benchmark_kernel.c");
    sink.write(&kernel_h, &benchmark_kernel_header(name))?;
    sink.write(&kernel_c, &benchmark_kernel_source(design, name, opts, &plan, &partitions))?;
    files.push(kernel_h);
    files.push(kernel_c);

    let driver = format!("{name}_benchmark_driver.c");
    sink.write(&driver, &benchmark_driver_source(name))?;
    files.push(driver);

    if opts.telemetry {
        let th = format!("{name}_telemetry_helpers.h");
        let tc = format!("{name}_telemetry_helpers.c");
        sink.write(&th, &telemetry_header(name))?;
        sink.write(&tc, &telemetry_source(name))?;
        files.push(th);
        files.push(tc);
    }
    if opts.papi {
        let ph = format!("{name}_papi_helpers.h");
        let pc = format!("{name}_papi_helpers.c");
        sink.write(&ph, &papi_header(name))?;
        sink.write(&pc, &papi_source(name))?;
        files.push(ph);
        files.push(pc);
    }
    if opts.io_variant == IoVariant::SharedMemory {
        let sh = format!("{name}_shmem_fifo.h");
        let sc = format!("{name}_shmem_fifo.c");
        sink.write(&sh, &shmem_fifo_header(name))?;
        sink.write(&sc, &shmem_fifo_source(name))?;
        files.push(sh);
        files.push(sc);
    }

    let makefile = format!("Makefile_{name}_{}", opts.io_variant.tag());
    sink.write(&makefile, &makefile_text(name, opts, &files))?;
    files.push(makefile);

    info!(
        target: "emit.multi",
        partitions = partitions.len(),
        fifos = plan.all.len(),
        files = files.len(),
        "multi_thread_emitted"
    );
    Ok(files)
}

// ---- Parameters header ---------------------------------------------------

fn parameters_header(name: &str, opts: &MultiThreadEmitOptions, partitions: &[i32]) -> String {
    let guard = format!("{}_PARAMETERS_H", name.to_uppercase());
    let mut s = format!("#ifndef {guard}\n#define {guard}\n\n");
    s.push_str(&format!("#define {}_BLOCK_SIZE {}\n", name.to_uppercase(), opts.block_len));
    s.push_str(&format!("#define {}_SUB_BLOCK_SIZE {}\n", name.to_uppercase(), opts.sub_block_len));
    s.push_str(&format!("#define {}_NUM_PARTITIONS {}\n", name.to_uppercase(), partitions.len()));
    s.push_str(&format!("#define {}_IO_PARTITION {}\n", name.to_uppercase(), PARTITION_IO));
    s.push_str("\n#ifndef STIM_LEN\n#define STIM_LEN 16384\n#endif\n");
    s.push_str("#ifndef TRIALS\n#define TRIALS 10\n#endif\n\n");

    // Partition -> CPU affinity map (-1 = unpinned).
    let cpus: Vec<String> = partitions
        .iter()
        .map(|p| opts.cpu_map.get(p).map(|c| c.to_string()).unwrap_or_else(|| "-1".into()))
        .collect();
    s.push_str(&format!(
        "static const int {name}_partition_cpu_map[{}] = {{{}}};\n",
        partitions.len().max(1),
        if cpus.is_empty() { "-1".to_string() } else { cpus.join(", ") }
    ));
    s.push_str(&format!("\n#endif // {guard}\n"));
    s
}

// ---- FIFO header ---------------------------------------------------------

fn fifo_ctype(design: &Design, fifo: NodeKey, port: u32) -> String {
    design.input_type(fifo, port).to_scalar().c_storage_type()
}

fn fifo_block_elems(design: &Design, fifo: NodeKey, port: u32) -> usize {
    let NodeKind::Fifo(f) = &design.node(fifo).kind else { return 1 };
    f.block_size.max(1) * design.input_type(fifo, port).num_elements()
}

fn fifo_header(
    design: &Design,
    name: &str,
    plan: &FifoPlan,
    partitions: &[i32],
) -> Result<String> {
    let guard = format!("{}_H", name.to_uppercase());
    let mut s = format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n#include <stdbool.h>\n#include <stdatomic.h>\n#include <string.h>\n\n#include \"{name}_parameters.h\"\n\n"
    );

    for &fifo in &plan.all {
        let ident = node_ident(design, fifo);
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        s.push_str(&format!(
            "// {} ({}), {} block(s) deep\n",
            design.qualified_name(fifo),
            f.variant.tag(),
            f.length_blocks
        ));
        s.push_str(&format!("typedef struct {ident}_s {{\n"));
        s.push_str("    _Atomic uint64_t writeCount;\n");
        s.push_str("    _Atomic uint64_t readCount;\n");
        for (i, _) in f.ports.iter().enumerate() {
            let ctype = fifo_ctype(design, fifo, i as u32);
            let elems = fifo_block_elems(design, fifo, i as u32);
            s.push_str(&format!("    {ctype} buffer_p{i}[{} * {elems}];\n", f.length_blocks));
        }
        s.push_str(&format!("}} {ident}_t;\n\n"));

        // Blocking one-block transfer helpers.  With cached indexes the
        // opposite counter is re-read only when the cached value stalls.
        let ports: Vec<usize> = (0..f.ports.len()).collect();
        let write_params: Vec<String> = ports
            .iter()
            .map(|i| format!("const {} *src_p{i}", fifo_ctype(design, fifo, *i as u32)))
            .collect();
        s.push_str(&format!(
            "static inline void {ident}_writeBlock({ident}_t *f, {}) {{\n",
            write_params.join(", ")
        ));
        if f.cached_indexes {
            s.push_str("    uint64_t cachedRead = atomic_load_explicit(&f->readCount, memory_order_acquire);\n");
            s.push_str(&format!(
                "    uint64_t w = atomic_load_explicit(&f->writeCount, memory_order_relaxed);\n    while (w - cachedRead >= {}) {{\n        cachedRead = atomic_load_explicit(&f->readCount, memory_order_acquire);\n    }}\n",
                f.length_blocks
            ));
        } else {
            s.push_str(&format!(
                "    uint64_t w = atomic_load_explicit(&f->writeCount, memory_order_relaxed);\n    while (w - atomic_load_explicit(&f->readCount, memory_order_acquire) >= {}) {{\n    }}\n",
                f.length_blocks
            ));
        }
        for i in &ports {
            let elems = fifo_block_elems(design, fifo, *i as u32);
            s.push_str(&format!(
                "    memcpy(&f->buffer_p{i}[(w % {len}) * {elems}], src_p{i}, sizeof(f->buffer_p{i}[0]) * {elems});\n",
                len = f.length_blocks
            ));
        }
        s.push_str("    atomic_store_explicit(&f->writeCount, w + 1, memory_order_release);\n}\n\n");

        let read_params: Vec<String> = ports
            .iter()
            .map(|i| format!("{} *dst_p{i}", fifo_ctype(design, fifo, *i as u32)))
            .collect();
        s.push_str(&format!(
            "static inline void {ident}_readBlock({ident}_t *f, {}) {{\n",
            read_params.join(", ")
        ));
        if f.cached_indexes {
            s.push_str("    uint64_t cachedWrite = atomic_load_explicit(&f->writeCount, memory_order_acquire);\n");
            s.push_str("    uint64_t r = atomic_load_explicit(&f->readCount, memory_order_relaxed);\n    while (cachedWrite == r) {\n        cachedWrite = atomic_load_explicit(&f->writeCount, memory_order_acquire);\n    }\n");
        } else {
            s.push_str("    uint64_t r = atomic_load_explicit(&f->readCount, memory_order_relaxed);\n    while (atomic_load_explicit(&f->writeCount, memory_order_acquire) == r) {\n    }\n");
        }
        for i in &ports {
            let elems = fifo_block_elems(design, fifo, *i as u32);
            s.push_str(&format!(
                "    memcpy(dst_p{i}, &f->buffer_p{i}[(r % {len}) * {elems}], sizeof(f->buffer_p{i}[0]) * {elems});\n",
                len = f.length_blocks
            ));
        }
        s.push_str("    atomic_store_explicit(&f->readCount, r + 1, memory_order_release);\n}\n\n");

        // Seed the ring with the FIFO's initial conditions.
        s.push_str(&format!("static inline void {ident}_init({ident}_t *f) {{\n"));
        s.push_str("    memset(f, 0, sizeof(*f));\n");
        let mut init_blocks_all = 0usize;
        for (i, port) in f.ports.iter().enumerate() {
            let elems = fifo_block_elems(design, fifo, i as u32);
            if port.init_conditions.is_empty() || elems == 0 {
                continue;
            }
            let ty = design.input_type(fifo, i as u32);
            let vals: Vec<String> =
                port.init_conditions.iter().map(|v| v.c_literal(&ty, false)).collect();
            s.push_str(&format!(
                "    {{ static const {} init[{}] = {{{}}}; memcpy(f->buffer_p{i}, init, sizeof(init)); }}\n",
                fifo_ctype(design, fifo, i as u32),
                vals.len(),
                vals.join(", ")
            ));
            init_blocks_all = init_blocks_all.max(port.init_conditions.len() / elems.max(1));
        }
        if init_blocks_all > 0 {
            s.push_str(&format!(
                "    atomic_store_explicit(&f->writeCount, {init_blocks_all}, memory_order_release);\n"
            ));
        }
        s.push_str("}\n\n");
    }

    // Thread argument structs and prototypes.
    for &p in partitions {
        s.push_str(&format!("typedef struct {{\n"));
        let mut seen = IndexSet::new();
        for fifo in fifos_touching(plan, p) {
            if seen.insert(fifo) {
                let ident = node_ident(design, fifo);
                s.push_str(&format!("    {ident}_t *{ident};\n"));
            }
        }
        s.push_str("    _Atomic bool *stop;\n");
        s.push_str(&format!("}} {name}_partition{p}_args_t;\n\n"));
        s.push_str(&format!("void *{name}_partition{p}_thread(void *argRaw);\n\n"));
    }

    // I/O thread args: every FIFO touching the I/O partition.
    s.push_str(&format!("typedef struct {{\n"));
    for fifo in fifos_touching(plan, PARTITION_IO) {
        let ident = node_ident(design, fifo);
        s.push_str(&format!("    {ident}_t *{ident};\n"));
    }
    s.push_str("    _Atomic bool *stop;\n    uint64_t stimLen;\n");
    s.push_str(&format!("}} {name}_io_args_t;\n\n"));
    s.push_str(&format!("void *{name}_io_thread(void *argRaw);\n\n"));

    s.push_str(&format!("#endif // {guard}\n"));
    Ok(s)
}

fn fifos_touching(plan: &FifoPlan, partition: i32) -> Vec<NodeKey> {
    let mut out: Vec<NodeKey> = Vec::new();
    for f in plan.inputs_of.get(&partition).into_iter().flatten() {
        out.push(*f);
    }
    for f in plan.outputs_of.get(&partition).into_iter().flatten() {
        if !out.contains(f) {
            out.push(*f);
        }
    }
    out
}

// ---- Partition thread functions -----------------------------------------

fn partition_source(
    design: &Design,
    name: &str,
    partition: i32,
    opts: &MultiThreadEmitOptions,
    plan: &FifoPlan,
) -> Result<String> {
    let nodes = helpers::scheduled_nodes(design, Some(partition));

    let mut prelude = CodeQueue::new();
    let mut body = CodeQueue::new();
    let mut st = EmitState::new();
    st.element_index = Some("blkIdx".to_string());

    helpers::emit_partition_body(design, &nodes, partition, true, &mut prelude, &mut body, &mut st)?;

    let mut s = format!("#include \"{name}.h\"\n\n");
    for decl in helpers::global_declarations(design, &nodes) {
        s.push_str(&decl);
        s.push('\n');
    }
    for decl in helpers::state_declarations(design, &nodes) {
        s.push_str(&decl);
        s.push('\n');
    }
    s.push('\n');

    s.push_str(&format!("void *{name}_partition{partition}_thread(void *argRaw) {{\n"));
    s.push_str(&format!(
        "    {name}_partition{partition}_args_t *args = ({name}_partition{partition}_args_t *) argRaw;\n"
    ));

    let inputs = plan.inputs_of.get(&partition).cloned().unwrap_or_default();
    let outputs = plan.outputs_of.get(&partition).cloned().unwrap_or_default();

    // Local block buffers matching the names the expressions reference.
    for &fifo in &inputs {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        for i in 0..f.ports.len() {
            let ctype = fifo_ctype(design, fifo, i as u32);
            let elems = fifo_block_elems(design, fifo, i as u32);
            s.push_str(&format!("    {ctype} {ident}_readBuf_p{i}[{elems}];\n"));
        }
    }
    for &fifo in &outputs {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        let bufs = if opts.double_buffer { 2 } else { 1 };
        for i in 0..f.ports.len() {
            let ctype = fifo_ctype(design, fifo, i as u32);
            let elems = fifo_block_elems(design, fifo, i as u32);
            if bufs == 2 {
                s.push_str(&format!("    {ctype} {ident}_writeBufs_p{i}[2][{elems}];\n"));
                s.push_str(&format!("    {ctype} *{ident}_writeBuf_p{i} = {ident}_writeBufs_p{i}[0];\n"));
            } else {
                s.push_str(&format!("    {ctype} {ident}_writeBuf_p{i}[{elems}];\n"));
            }
        }
        if opts.double_buffer {
            s.push_str(&format!("    int {ident}_writeSel = 0;\n"));
        }
    }
    s.push('\n');
    s.push_str(&helpers::render(&prelude, 1));
    s.push_str("    while (!atomic_load_explicit(args->stop, memory_order_acquire)) {\n");

    for &fifo in &inputs {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        let args: Vec<String> =
            (0..f.ports.len()).map(|i| format!("{ident}_readBuf_p{i}")).collect();
        s.push_str(&format!("        {ident}_readBlock(args->{ident}, {});\n", args.join(", ")));
    }

    s.push_str(&format!(
        "        for (uint64_t blkIdx = 0; blkIdx < {}; blkIdx++) {{\n",
        opts.block_len.max(1)
    ));
    s.push_str(&helpers::render(&body, 3));
    s.push_str("        }\n");

    for &fifo in &outputs {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        let args: Vec<String> =
            (0..f.ports.len()).map(|i| format!("{ident}_writeBuf_p{i}")).collect();
        s.push_str(&format!("        {ident}_writeBlock(args->{ident}, {});\n", args.join(", ")));
        if opts.double_buffer {
            s.push_str(&format!("        {ident}_writeSel ^= 1;\n"));
            for i in 0..f.ports.len() {
                s.push_str(&format!(
                    "        {ident}_writeBuf_p{i} = {ident}_writeBufs_p{i}[{ident}_writeSel];\n"
                ));
            }
        }
    }

    s.push_str("    }\n    return NULL;\n}\n");
    Ok(s)
}

// ---- I/O thread ----------------------------------------------------------

fn io_thread_source(
    design: &Design,
    name: &str,
    opts: &MultiThreadEmitOptions,
    plan: &FifoPlan,
) -> Result<String> {
    let mut s = format!("#include \"{name}.h\"\n");
    match opts.io_variant {
        IoVariant::Pipe => s.push_str("#include <unistd.h>\n#include <fcntl.h>\n"),
        IoVariant::Socket => {
            s.push_str("#include <sys/socket.h>\n#include <netinet/in.h>\n#include <unistd.h>\n")
        }
        IoVariant::SharedMemory => s.push_str(&format!("#include \"{name}_shmem_fifo.h\"\n")),
        IoVariant::ConstantSource => {}
    }
    s.push('\n');

    // FIFOs written by the I/O partition feed the design inputs; FIFOs read
    // by it drain the design outputs.
    let feeds = plan.outputs_of.get(&PARTITION_IO).cloned().unwrap_or_default();
    let drains = plan.inputs_of.get(&PARTITION_IO).cloned().unwrap_or_default();

    s.push_str(&format!("void *{name}_io_thread(void *argRaw) {{\n"));
    s.push_str(&format!("    {name}_io_args_t *args = ({name}_io_args_t *) argRaw;\n"));
    for &fifo in feeds.iter().chain(drains.iter()) {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        for i in 0..f.ports.len() {
            let ctype = fifo_ctype(design, fifo, i as u32);
            let elems = fifo_block_elems(design, fifo, i as u32);
            s.push_str(&format!("    {ctype} {ident}_blk_p{i}[{elems}];\n"));
        }
    }
    s.push_str(&format!(
        "    uint64_t blocks = args->stimLen / {};\n",
        opts.block_len.max(1)
    ));
    s.push_str("    for (uint64_t b = 0; b < blocks && !atomic_load_explicit(args->stop, memory_order_acquire); b++) {\n");

    for &fifo in &feeds {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        for i in 0..f.ports.len() {
            let elems = fifo_block_elems(design, fifo, i as u32);
            match opts.io_variant {
                IoVariant::ConstantSource => {
                    s.push_str(&format!(
                        "        memset({ident}_blk_p{i}, 0, sizeof({ident}_blk_p{i}));\n"
                    ));
                }
                IoVariant::Pipe => {
                    s.push_str(&format!(
                        "        if (read(STDIN_FILENO, {ident}_blk_p{i}, sizeof({ident}_blk_p{i})) != (ssize_t) sizeof({ident}_blk_p{i})) break;\n"
                    ));
                }
                IoVariant::Socket => {
                    s.push_str(&format!(
                        "        if (recv({name}_io_socket_fd, {ident}_blk_p{i}, sizeof({ident}_blk_p{i}), MSG_WAITALL) <= 0) break;\n"
                    ));
                }
                IoVariant::SharedMemory => {
                    s.push_str(&format!(
                        "        {name}_shmem_fifo_read(&{name}_shmem_in, {ident}_blk_p{i}, {elems} * sizeof({ident}_blk_p{i}[0]));\n"
                    ));
                }
            }
        }
        let args_list: Vec<String> =
            (0..f.ports.len()).map(|i| format!("{ident}_blk_p{i}")).collect();
        s.push_str(&format!("        {ident}_writeBlock(args->{ident}, {});\n", args_list.join(", ")));
    }

    for &fifo in &drains {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { unreachable!() };
        let ident = node_ident(design, fifo);
        let args_list: Vec<String> =
            (0..f.ports.len()).map(|i| format!("{ident}_blk_p{i}")).collect();
        s.push_str(&format!("        {ident}_readBlock(args->{ident}, {});\n", args_list.join(", ")));
        for i in 0..f.ports.len() {
            let elems = fifo_block_elems(design, fifo, i as u32);
            match opts.io_variant {
                IoVariant::ConstantSource => {
                    s.push_str(&format!(
                        "        (void) {ident}_blk_p{i}; // discarded\n"
                    ));
                }
                IoVariant::Pipe => {
                    s.push_str(&format!(
                        "        if (write(STDOUT_FILENO, {ident}_blk_p{i}, sizeof({ident}_blk_p{i})) != (ssize_t) sizeof({ident}_blk_p{i})) break;\n"
                    ));
                }
                IoVariant::Socket => {
                    s.push_str(&format!(
                        "        if (send({name}_io_socket_fd, {ident}_blk_p{i}, sizeof({ident}_blk_p{i}), 0) <= 0) break;\n"
                    ));
                }
                IoVariant::SharedMemory => {
                    s.push_str(&format!(
                        "        {name}_shmem_fifo_write(&{name}_shmem_out, {ident}_blk_p{i}, {elems} * sizeof({ident}_blk_p{i}[0]));\n"
                    ));
                }
            }
        }
    }

    s.push_str("    }\n    atomic_store_explicit(args->stop, true, memory_order_release);\n    return NULL;\n}\n");

    if opts.io_variant == IoVariant::Socket {
        // Listener scaffolding the driver fills in before spawning threads.
        s = s.replace(
            &format!("#include \"{name}.h\"\n"),
            &format!("#include \"{name}.h\"\nint {name}_io_socket_fd = -1;\n"),
        );
    }
    if opts.io_variant == IoVariant::SharedMemory {
        s = s.replace(
            &format!("#include \"{name}_shmem_fifo.h\"\n"),
            &format!(
                "#include \"{name}_shmem_fifo.h\"\n{name}_shmem_fifo_t {name}_shmem_in;\n{name}_shmem_fifo_t {name}_shmem_out;\n"
            ),
        );
    }
    Ok(s)
}

// ---- Benchmark kernel & driver ------------------------------------------

fn benchmark_kernel_header(name: &str) -> String {
    let guard = format!("{}_BENCHMARK_KERNEL_H", name.to_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n\n// Runs all partition threads plus the I/O thread over stimLen samples and\n// returns the elapsed wall time in seconds.\ndouble {name}_benchmark_run(uint64_t stimLen);\n\n#endif\n"
    )
}

fn benchmark_kernel_source(
    design: &Design,
    name: &str,
    opts: &MultiThreadEmitOptions,
    plan: &FifoPlan,
    partitions: &[i32],
) -> String {
    let mut s = format!(
        "#define _GNU_SOURCE\n#include \"{name}.h\"\n#include \"{name}_benchmark_kernel.h\"\n#include <pthread.h>\n#include <sched.h>\n#include <stdlib.h>\n#include <time.h>\n\n"
    );

    for &fifo in &plan.all {
        let ident = node_ident(design, fifo);
        s.push_str(&format!("static {ident}_t {ident}_inst;\n"));
    }
    s.push_str("\nstatic _Atomic bool stopFlag;\n\n");

    s.push_str("static void pin_and_prioritize(pthread_attr_t *attr, int cpu, bool realtime) {\n");
    s.push_str("    pthread_attr_init(attr);\n");
    s.push_str("    if (cpu >= 0) {\n        cpu_set_t cpus;\n        CPU_ZERO(&cpus);\n        CPU_SET(cpu, &cpus);\n        pthread_attr_setaffinity_np(attr, sizeof(cpus), &cpus);\n    }\n");
    s.push_str("    if (realtime) {\n        struct sched_param sp;\n        sp.sched_priority = sched_get_priority_max(SCHED_FIFO);\n        pthread_attr_setschedpolicy(attr, SCHED_FIFO);\n        pthread_attr_setschedparam(attr, &sp);\n        pthread_attr_setinheritsched(attr, PTHREAD_EXPLICIT_SCHED);\n    }\n}\n\n");

    s.push_str(&format!("double {name}_benchmark_run(uint64_t stimLen) {{\n"));
    s.push_str("    atomic_store(&stopFlag, false);\n");
    for &fifo in &plan.all {
        let ident = node_ident(design, fifo);
        s.push_str(&format!("    {ident}_init(&{ident}_inst);\n"));
    }
    s.push('\n');

    for &p in partitions {
        s.push_str(&format!("    {name}_partition{p}_args_t args{p} = {{\n"));
        for fifo in fifos_touching(plan, p) {
            let ident = node_ident(design, fifo);
            s.push_str(&format!("        .{ident} = &{ident}_inst,\n"));
        }
        s.push_str("        .stop = &stopFlag,\n    };\n");
    }
    s.push_str(&format!("    {name}_io_args_t argsIo = {{\n"));
    for fifo in fifos_touching(plan, PARTITION_IO) {
        let ident = node_ident(design, fifo);
        s.push_str(&format!("        .{ident} = &{ident}_inst,\n"));
    }
    s.push_str("        .stop = &stopFlag,\n        .stimLen = stimLen,\n    };\n\n");

    s.push_str("    struct timespec start, end;\n    clock_gettime(CLOCK_MONOTONIC, &start);\n\n");
    s.push_str(&format!(
        "    pthread_t threads[{}];\n    pthread_attr_t attrs[{}];\n",
        partitions.len() + 1,
        partitions.len() + 1
    ));
    let realtime = if opts.realtime { "true" } else { "false" };
    for (idx, &p) in partitions.iter().enumerate() {
        s.push_str(&format!(
            "    pin_and_prioritize(&attrs[{idx}], {name}_partition_cpu_map[{idx}], {realtime});\n"
        ));
        s.push_str(&format!(
            "    pthread_create(&threads[{idx}], &attrs[{idx}], {name}_partition{p}_thread, &args{p});\n"
        ));
    }
    let io_idx = partitions.len();
    s.push_str(&format!("    pin_and_prioritize(&attrs[{io_idx}], -1, false);\n"));
    s.push_str(&format!(
        "    pthread_create(&threads[{io_idx}], &attrs[{io_idx}], {name}_io_thread, &argsIo);\n\n"
    ));
    s.push_str(&format!("    pthread_join(threads[{io_idx}], NULL);\n"));
    s.push_str("    atomic_store(&stopFlag, true);\n");
    s.push_str(&format!(
        "    for (int i = 0; i < {}; i++) {{\n        pthread_join(threads[i], NULL);\n    }}\n\n",
        partitions.len()
    ));
    s.push_str("    clock_gettime(CLOCK_MONOTONIC, &end);\n");
    s.push_str("    return (double)(end.tv_sec - start.tv_sec) + (double)(end.tv_nsec - start.tv_nsec) * 1e-9;\n}\n");
    s
}

fn benchmark_driver_source(name: &str) -> String {
    format!(
        "#include \"{name}_benchmark_kernel.h\"\n#include \"{name}_parameters.h\"\n#include <stdio.h>\n\nint main(void) {{\n    double total = 0.0;\n    for (int trial = 0; trial < TRIALS; trial++) {{\n        double t = {name}_benchmark_run(STIM_LEN);\n        printf(\"trial %d: %f s (%f Msamples/s)\\n\", trial, t, (double) STIM_LEN / t / 1e6);\n        total += t;\n    }}\n    printf(\"mean: %f s over %d trials\\n\", total / TRIALS, TRIALS);\n    return 0;\n}}\n"
    )
}

// ---- Telemetry / PAPI ----------------------------------------------------

fn telemetry_header(name: &str) -> String {
    let guard = format!("{}_TELEMETRY_HELPERS_H", name.to_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n\ntypedef struct {{\n    uint64_t blocksProcessed;\n    double startTime;\n    double lastReportTime;\n}} {name}_telemetry_t;\n\nvoid {name}_telemetry_start({name}_telemetry_t *t);\nvoid {name}_telemetry_block({name}_telemetry_t *t, int partition, uint64_t blockSize);\n\n#endif\n"
    )
}

fn telemetry_source(name: &str) -> String {
    format!(
        "#include \"{name}_telemetry_helpers.h\"\n#include <stdio.h>\n#include <time.h>\n\nstatic double now_seconds(void) {{\n    struct timespec ts;\n    clock_gettime(CLOCK_MONOTONIC, &ts);\n    return (double) ts.tv_sec + (double) ts.tv_nsec * 1e-9;\n}}\n\nvoid {name}_telemetry_start({name}_telemetry_t *t) {{\n    t->blocksProcessed = 0;\n    t->startTime = now_seconds();\n    t->lastReportTime = t->startTime;\n}}\n\nvoid {name}_telemetry_block({name}_telemetry_t *t, int partition, uint64_t blockSize) {{\n    t->blocksProcessed++;\n    double now = now_seconds();\n    if (now - t->lastReportTime >= 1.0) {{\n        double rate = (double)(t->blocksProcessed * blockSize) / (now - t->startTime);\n        fprintf(stderr, \"partition %d: %.3f Msamples/s\\n\", partition, rate / 1e6);\n        t->lastReportTime = now;\n    }}\n}}\n"
    )
}

fn papi_header(name: &str) -> String {
    let guard = format!("{}_PAPI_HELPERS_H", name.to_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n\nint {name}_papi_start(void);\nvoid {name}_papi_stop(int eventSet, long long *counters);\n\n#endif\n"
    )
}

fn papi_source(name: &str) -> String {
    format!(
        "#include \"{name}_papi_helpers.h\"\n#include <papi.h>\n#include <stdio.h>\n\nint {name}_papi_start(void) {{\n    int eventSet = PAPI_NULL;\n    if (PAPI_library_init(PAPI_VER_CURRENT) != PAPI_VER_CURRENT) {{\n        fprintf(stderr, \"PAPI init failed\\n\");\n        return PAPI_NULL;\n    }}\n    PAPI_create_eventset(&eventSet);\n    PAPI_add_event(eventSet, PAPI_TOT_CYC);\n    PAPI_add_event(eventSet, PAPI_TOT_INS);\n    PAPI_start(eventSet);\n    return eventSet;\n}}\n\nvoid {name}_papi_stop(int eventSet, long long *counters) {{\n    PAPI_stop(eventSet, counters);\n}}\n"
    )
}

// ---- Shared-memory FIFO helper ------------------------------------------

fn shmem_fifo_header(name: &str) -> String {
    let guard = format!("{}_SHMEM_FIFO_H", name.to_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n\n#include <stdatomic.h>\n#include <stddef.h>\n#include <stdint.h>\n\ntypedef struct {{\n    _Atomic uint64_t writeOffset;\n    _Atomic uint64_t readOffset;\n    size_t capacity;\n    uint8_t *buffer;\n    int fd;\n}} {name}_shmem_fifo_t;\n\nint {name}_shmem_fifo_open({name}_shmem_fifo_t *f, const char *shmName, size_t capacity, int create);\nvoid {name}_shmem_fifo_read({name}_shmem_fifo_t *f, void *dst, size_t bytes);\nvoid {name}_shmem_fifo_write({name}_shmem_fifo_t *f, const void *src, size_t bytes);\nvoid {name}_shmem_fifo_close({name}_shmem_fifo_t *f);\n\n#endif\n"
    )
}

fn shmem_fifo_source(name: &str) -> String {
    format!(
        "#include \"{name}_shmem_fifo.h\"\n#include <fcntl.h>\n#include <string.h>\n#include <sys/mman.h>\n#include <unistd.h>\n\nint {name}_shmem_fifo_open({name}_shmem_fifo_t *f, const char *shmName, size_t capacity, int create) {{\n    int flags = create ? (O_RDWR | O_CREAT) : O_RDWR;\n    f->fd = shm_open(shmName, flags, 0600);\n    if (f->fd < 0) {{\n        return -1;\n    }}\n    if (create && ftruncate(f->fd, (off_t) capacity) != 0) {{\n        return -1;\n    }}\n    f->capacity = capacity;\n    f->buffer = mmap(NULL, capacity, PROT_READ | PROT_WRITE, MAP_SHARED, f->fd, 0);\n    if (f->buffer == MAP_FAILED) {{\n        return -1;\n    }}\n    atomic_store(&f->writeOffset, 0);\n    atomic_store(&f->readOffset, 0);\n    return 0;\n}}\n\nvoid {name}_shmem_fifo_write({name}_shmem_fifo_t *f, const void *src, size_t bytes) {{\n    uint64_t w = atomic_load_explicit(&f->writeOffset, memory_order_relaxed);\n    while (w + bytes - atomic_load_explicit(&f->readOffset, memory_order_acquire) > f->capacity) {{\n    }}\n    for (size_t i = 0; i < bytes; i++) {{\n        f->buffer[(w + i) % f->capacity] = ((const uint8_t *) src)[i];\n    }}\n    atomic_store_explicit(&f->writeOffset, w + bytes, memory_order_release);\n}}\n\nvoid {name}_shmem_fifo_read({name}_shmem_fifo_t *f, void *dst, size_t bytes) {{\n    uint64_t r = atomic_load_explicit(&f->readOffset, memory_order_relaxed);\n    while (atomic_load_explicit(&f->writeOffset, memory_order_acquire) - r < bytes) {{\n    }}\n    for (size_t i = 0; i < bytes; i++) {{\n        ((uint8_t *) dst)[i] = f->buffer[(r + i) % f->capacity];\n    }}\n    atomic_store_explicit(&f->readOffset, r + bytes, memory_order_release);\n}}\n\nvoid {name}_shmem_fifo_close({name}_shmem_fifo_t *f) {{\n    munmap(f->buffer, f->capacity);\n    close(f->fd);\n}}\n"
    )
}

// ---- Makefile ------------------------------------------------------------

fn makefile_text(name: &str, opts: &MultiThreadEmitOptions, files: &[String]) -> String {
    let srcs: Vec<&String> = files.iter().filter(|f| f.ends_with(".c")).collect();
    let mut s = String::new();
    s.push_str(&format!("# Build file for {name} ({} I/O variant)\n", opts.io_variant.tag()));
    s.push_str("CC ?= gcc\n");
    s.push_str("CFLAGS ?= -O3 -std=c11 -march=native -pthread\n");
    if opts.papi {
        s.push_str("LDLIBS += -lpapi\n");
    }
    if opts.io_variant == IoVariant::SharedMemory {
        s.push_str("LDLIBS += -lrt\n");
    }
    s.push_str("LDLIBS += -lpthread\n\n");
    s.push_str("SRCS = \\\n");
    for (i, src) in srcs.iter().enumerate() {
        let sep = if i + 1 == srcs.len() { "\n" } else { " \\\n" };
        s.push_str(&format!("    {src}{sep}"));
    }
    s.push_str(&format!("\nTARGET = {name}_benchmark\n\n"));
    s.push_str("all: $(TARGET)\n\n");
    s.push_str("$(TARGET): $(SRCS)\n\t$(CC) $(CFLAGS) -o $@ $(SRCS) $(LDLIBS)\n\n");
    s.push_str("clean:\n\trm -f $(TARGET)\n\n.PHONY: all clean\n");
    s
}

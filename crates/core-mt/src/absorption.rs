//! Delay ↔ FIFO absorption and FIFO merging.
//!
//! Absorption moves initial conditions between FIFOs and the delays directly
//! adjacent to them, repeating per FIFO until a fixed point.  The total
//! `fifo_init + adjacent_delay_length` along each directly-connected chain is
//! invariant.  Afterwards, FIFOs whose stored initial-condition count is not
//! a multiple of the block size are reshaped by splitting the remainder into
//! a synthesized delay, and FIFOs sharing a partition pair are merged.

use indexmap::IndexMap;
use tracing::{debug, info};

use core_ir::{
    ArcKey, CompileError, Delay, Design, NodeKey, NodeKind, PortRef, Result,
};
use core_types::NumericValue;

/// Samples a FIFO can still accept as initial conditions: one block stays
/// reserved so the producer can always stage a write.
fn fifo_room_samples(design: &Design, fifo: NodeKey) -> usize {
    let NodeKind::Fifo(f) = &design.node(fifo).kind else { return 0 };
    let capacity = f.length_blocks.saturating_sub(1) * f.block_size;
    capacity.saturating_sub(f.init_count(0) / elements_per_sample(design, fifo))
}

fn elements_per_sample(design: &Design, fifo: NodeKey) -> usize {
    design.input_type(fifo, 0).num_elements().max(1)
}

/// The single input arc of a single-port FIFO.  Multiple input ports during
/// absorption are a transform error.
fn fifo_input_arc(design: &Design, fifo: NodeKey) -> Result<Option<ArcKey>> {
    let node = design.node(fifo);
    if node.inputs.len() > 1 {
        return Err(CompileError::Transform(format!(
            "`{}` has multiple input ports during absorption",
            design.qualified_name(fifo)
        )));
    }
    Ok(design.input_arc(fifo, 0))
}

fn same_partition_and_context(design: &Design, a: NodeKey, b: NodeKey) -> bool {
    design.node(a).partition == design.node(b).partition
        && design.node(a).contexts == design.node(b).contexts
}

/// Absorb the predecessor delay into the FIFO (fully or partially).
/// Returns true if anything moved.
fn absorb_input_delay(design: &mut Design, fifo: NodeKey) -> Result<bool> {
    let Some(in_arc) = fifo_input_arc(design, fifo)? else { return Ok(false) };
    let pred = design.arc(in_arc).src.node;
    let NodeKind::Delay(d) = design.node(pred).kind.clone() else { return Ok(false) };
    if d.delay == 0 || d.earliest_first || d.allocate_extra_space {
        return Ok(false);
    }
    if !same_partition_and_context(design, pred, fifo) {
        return Ok(false);
    }
    // The delay must feed exactly this FIFO and nothing else.
    let consumers = design.out_arcs(pred);
    if consumers.len() != 1 || consumers[0] != in_arc {
        return Ok(false);
    }

    let elements = elements_per_sample(design, fifo);
    let room = fifo_room_samples(design, fifo);
    if room == 0 {
        return Ok(false);
    }
    let mut init = d.init_conditions.clone();
    if init.len() == 1 && d.delay * elements > 1 {
        init = vec![init[0]; d.delay * elements];
    }

    if d.delay <= room {
        // Full absorption: append all delay tokens, delete the delay, and
        // rewire its input straight into the FIFO.
        if let NodeKind::Fifo(f) = &mut design.node_mut(fifo).kind {
            f.ports[0].init_conditions.extend(init);
        }
        let delay_in = design.input_arc(pred, 0);
        design.remove_arc(in_arc);
        if let Some(delay_in) = delay_in {
            design.set_arc_dst(delay_in, PortRef::input(fifo, 0));
        }
        debug!(
            target: "mt.absorb",
            fifo = %design.qualified_name(fifo),
            delay = d.delay,
            "input_delay_fully_absorbed"
        );
        design.remove_node(pred)?;
        Ok(true)
    } else {
        // Partial: move the first `room` samples; the delay shrinks.
        let moved: Vec<NumericValue> = init.drain(..room * elements).collect();
        if let NodeKind::Fifo(f) = &mut design.node_mut(fifo).kind {
            f.ports[0].init_conditions.extend(moved);
        }
        if let NodeKind::Delay(payload) = &mut design.node_mut(pred).kind {
            payload.delay = d.delay - room;
            payload.init_conditions = init;
        }
        debug!(
            target: "mt.absorb",
            fifo = %design.qualified_name(fifo),
            moved = room,
            remaining = d.delay - room,
            "input_delay_partially_absorbed"
        );
        Ok(true)
    }
}

/// Absorb downstream delays into the FIFO head: the longest common postfix
/// of all downstream delays' initial conditions moves in front of the FIFO's
/// existing initial conditions.
fn absorb_output_delays(design: &mut Design, fifo: NodeKey) -> Result<bool> {
    if !design.node(fifo).order_out.arcs.is_empty() {
        return Ok(false);
    }
    let out_arcs = design.out_arcs(fifo);
    if out_arcs.is_empty() {
        return Ok(false);
    }
    let mut delays = Vec::new();
    for a in &out_arcs {
        let dst = design.arc(*a).dst.node;
        match &design.node(dst).kind {
            NodeKind::Delay(d)
                if !d.earliest_first
                    && !d.allocate_extra_space
                    && d.delay > 0
                    && same_partition_and_context(design, dst, fifo)
                    && design.in_arcs(dst).len() == 1 =>
            {
                delays.push((dst, d.clone()));
            }
            _ => return Ok(false),
        }
    }

    let elements = elements_per_sample(design, fifo);
    let normalized: Vec<Vec<NumericValue>> = delays
        .iter()
        .map(|(_, d)| {
            let mut init = d.init_conditions.clone();
            if init.len() == 1 && d.delay * elements > 1 {
                init = vec![init[0]; d.delay * elements];
            }
            init
        })
        .collect();

    // Longest common postfix, in samples.
    let mut common_samples = delays.iter().map(|(_, d)| d.delay).min().unwrap_or(0);
    'outer: while common_samples > 0 {
        let take = common_samples * elements;
        let reference = &normalized[0][normalized[0].len() - take..];
        for init in &normalized[1..] {
            if &init[init.len() - take..] != reference {
                common_samples -= 1;
                continue 'outer;
            }
        }
        break;
    }
    let moved = common_samples.min(fifo_room_samples(design, fifo));
    if moved == 0 {
        return Ok(false);
    }

    let take = moved * elements;
    let postfix: Vec<NumericValue> =
        normalized[0][normalized[0].len() - take..].to_vec();
    if let NodeKind::Fifo(f) = &mut design.node_mut(fifo).kind {
        let mut merged = postfix;
        merged.extend(f.ports[0].init_conditions.drain(..));
        f.ports[0].init_conditions = merged;
    }

    for ((key, d), init) in delays.iter().zip(normalized) {
        let remaining = d.delay - moved;
        if remaining == 0 {
            // Pass the FIFO output straight through to the delay's readers.
            for a in design.out_arcs(*key) {
                design.set_arc_src(a, PortRef::output(fifo, 0));
            }
            let in_arc = design.input_arc(*key, 0);
            if let Some(in_arc) = in_arc {
                design.remove_arc(in_arc);
            }
            design.remove_node(*key)?;
        } else if let NodeKind::Delay(payload) = &mut design.node_mut(*key).kind {
            payload.delay = remaining;
            payload.init_conditions = init[..remaining * elements].to_vec();
        }
    }
    debug!(
        target: "mt.absorb",
        fifo = %design.qualified_name(fifo),
        moved,
        "output_delays_absorbed"
    );
    Ok(true)
}

/// Split off the non-block-multiple remainder of a FIFO's initial conditions
/// into a synthesized delay at the FIFO input (or at the output when the
/// FIFO is driven by the input master).
fn reshape_to_block_multiple(design: &mut Design, fifo: NodeKey) -> Result<bool> {
    let NodeKind::Fifo(f) = &design.node(fifo).kind else { return Ok(false) };
    let block = f.block_size.max(1);
    let elements = elements_per_sample(design, fifo);
    let samples = f.init_count(0) / elements;
    let remainder = samples % block;
    if remainder == 0 {
        return Ok(false);
    }
    let parent = design.node(fifo).parent;
    let partition = design.node(fifo).partition;
    let contexts = design.node(fifo).contexts.clone();
    let driven_by_master = fifo_input_arc(design, fifo)?
        .map(|a| design.arc(a).src.node == design.input_master())
        .unwrap_or(false);

    let take = remainder * elements;
    let (moved, at_output): (Vec<NumericValue>, bool) = {
        let NodeKind::Fifo(f) = &mut design.node_mut(fifo).kind else { unreachable!() };
        if driven_by_master {
            // Output-side delay takes the head of the FIFO's conditions.
            (f.ports[0].init_conditions.drain(..take).collect(), true)
        } else {
            // Input-side delay takes the tail.
            let split = f.ports[0].init_conditions.len() - take;
            (f.ports[0].init_conditions.split_off(split), false)
        }
    };

    let mut payload = Delay::new(remainder, moved);
    payload.broadcast_init(elements);
    let delay = design.add_node(
        format!("{}_reshape", design.node(fifo).name),
        NodeKind::Delay(payload),
        parent,
    );
    design.node_mut(delay).partition = partition;
    design.node_mut(delay).contexts = contexts;

    if at_output {
        for a in design.out_arcs(fifo) {
            design.set_arc_src(a, PortRef::output(delay, 0));
        }
        let ty = design.input_type(fifo, 0);
        design.add_arc(PortRef::output(fifo, 0), PortRef::input(delay, 0), ty, -1.0);
    } else {
        let in_arc = fifo_input_arc(design, fifo)?.ok_or_else(|| {
            CompileError::Transform(format!(
                "`{}` has no producer to reshape against",
                design.qualified_name(fifo)
            ))
        })?;
        let ty = design.arc(in_arc).data_type.clone();
        design.set_arc_dst(in_arc, PortRef::input(delay, 0));
        design.add_arc(PortRef::output(delay, 0), PortRef::input(fifo, 0), ty, -1.0);
    }
    debug!(
        target: "mt.absorb",
        fifo = %design.qualified_name(fifo),
        remainder,
        at_output,
        "fifo_reshaped"
    );
    Ok(true)
}

/// Run absorption to a fixed point on every FIFO, then reshape each to a
/// block multiple.
pub fn absorb_adjacent_delays(design: &mut Design) -> Result<()> {
    let fifos: Vec<NodeKey> = design
        .node_keys()
        .into_iter()
        .filter(|k| matches!(design.node(*k).kind, NodeKind::Fifo(_)))
        .collect();
    for fifo in &fifos {
        loop {
            let moved_in = absorb_input_delay(design, *fifo)?;
            let moved_out = absorb_output_delays(design, *fifo)?;
            if !moved_in && !moved_out {
                break;
            }
        }
    }
    for fifo in &fifos {
        reshape_to_block_multiple(design, *fifo)?;
    }
    info!(target: "mt.absorb", fifos = fifos.len(), "absorption_complete");
    Ok(())
}

/// Merge FIFOs sharing the same (source partition, destination partition)
/// into one FIFO with multiple port pairs.  Before aliasing, every FIFO in
/// the group is trimmed to the group's minimum initial-condition count by
/// splitting the excess into input-side delays.
pub fn merge_fifos(design: &mut Design) -> Result<usize> {
    let mut by_pair: IndexMap<(i32, i32), Vec<NodeKey>> = IndexMap::new();
    for key in design.node_keys() {
        if !matches!(design.node(key).kind, NodeKind::Fifo(_)) {
            continue;
        }
        let src_part = design.node(key).partition;
        let dst_part = design
            .out_arcs(key)
            .first()
            .map(|a| design.node(design.arc(*a).dst.node).partition)
            .unwrap_or(src_part);
        by_pair.entry((src_part, dst_part)).or_default().push(key);
    }

    let mut merged = 0usize;
    for ((src_part, dst_part), group) in by_pair {
        if group.len() < 2 {
            continue;
        }
        // Trim to the group's minimum count (in samples).
        let min_samples = group
            .iter()
            .map(|f| {
                let NodeKind::Fifo(p) = &design.node(*f).kind else { unreachable!() };
                p.init_count(0) / elements_per_sample(design, *f)
            })
            .min()
            .unwrap_or(0);
        for &fifo in &group {
            trim_fifo_to(design, fifo, min_samples)?;
        }

        let survivor = group[0];
        for &other in &group[1..] {
            let pair_index = {
                let NodeKind::Fifo(s) = &design.node(survivor).kind else { unreachable!() };
                s.ports.len() as u32
            };
            // Producer arc moves onto a fresh input port of the survivor.
            if let Some(in_arc) = fifo_input_arc(design, other)? {
                design.set_arc_dst(in_arc, PortRef::input(survivor, pair_index));
            }
            for a in design.out_arcs(other) {
                design.set_arc_src(a, PortRef::output(survivor, pair_index));
            }
            let port = {
                let NodeKind::Fifo(o) = &design.node(other).kind else { unreachable!() };
                o.ports[0].clone()
            };
            if let NodeKind::Fifo(s) = &mut design.node_mut(survivor).kind {
                s.ports.push(port);
            }
            design.remove_node(other)?;
            merged += 1;
        }
        debug!(
            target: "mt.absorb",
            src_part,
            dst_part,
            survivor = %design.qualified_name(survivor),
            "fifos_merged"
        );
    }
    Ok(merged)
}

/// Trim a FIFO's initial conditions down to `target` samples by splitting
/// the excess tail into an input-side delay.
fn trim_fifo_to(design: &mut Design, fifo: NodeKey, target: usize) -> Result<()> {
    let elements = elements_per_sample(design, fifo);
    let excess = {
        let NodeKind::Fifo(f) = &design.node(fifo).kind else { return Ok(()) };
        (f.init_count(0) / elements).saturating_sub(target)
    };
    if excess == 0 {
        return Ok(());
    }
    let take = excess * elements;
    let moved: Vec<NumericValue> = {
        let NodeKind::Fifo(f) = &mut design.node_mut(fifo).kind else { unreachable!() };
        let split = f.ports[0].init_conditions.len() - take;
        f.ports[0].init_conditions.split_off(split)
    };

    let in_arc = fifo_input_arc(design, fifo)?.ok_or_else(|| {
        CompileError::Transform(format!(
            "`{}` has no producer to trim against",
            design.qualified_name(fifo)
        ))
    })?;
    let parent = design.node(fifo).parent;
    let delay = design.add_node(
        format!("{}_trim", design.node(fifo).name),
        NodeKind::Delay(Delay::new(excess, moved)),
        parent,
    );
    design.node_mut(delay).partition = design.node(fifo).partition;
    design.node_mut(delay).contexts = design.node(fifo).contexts.clone();

    let ty = design.arc(in_arc).data_type.clone();
    design.set_arc_dst(in_arc, PortRef::input(delay, 0));
    design.add_arc(PortRef::output(delay, 0), PortRef::input(fifo, 0), ty, -1.0);
    Ok(())
}

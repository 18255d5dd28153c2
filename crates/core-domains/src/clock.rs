//! Clock-domain discovery, rate rediscovery, specialization, support-node
//! creation, and rate validation.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use core_ir::{
    ClockDomainVariant, CompileError, Design, NodeKey, NodeKind, RateChangeVariant, Result,
    TickCounter,
};

/// All clock-domain nodes in the design.
pub fn find_clock_domains(design: &Design) -> Vec<NodeKey> {
    design
        .node_keys()
        .into_iter()
        .filter(|k| matches!(design.node(*k).kind, NodeKind::ClockDomain(_)))
        .collect()
}

/// Drop the master nodes' per-port clock-domain links; they are rebuilt by
/// [`assign_master_port_clock_domains`].
pub fn reset_master_clock_domain_links(design: &mut Design) {
    for key in design.master_keys() {
        if let NodeKind::Master(m) = &mut design.node_mut(key).kind {
            m.reset_clock_domain_links();
        }
    }
}

/// Nearest enclosing clock domain of a node, if any.
pub fn domain_of(design: &Design, key: NodeKey) -> Option<NodeKey> {
    let mut cur = design.node(key).parent;
    while let Some(p) = cur {
        if matches!(design.node(p).kind, NodeKind::ClockDomain(_)) {
            return Some(p);
        }
        cur = design.node(p).parent;
    }
    None
}

/// Rediscover each domain's rate from the rate-change nodes on its boundary,
/// and register those nodes with the domain.
pub fn rediscover_rates(design: &mut Design) -> Result<()> {
    for domain in find_clock_domains(design) {
        let mut rate: Option<(u32, u32)> = None;
        let mut rc_in = IndexSet::new();
        let mut rc_out = IndexSet::new();

        for child in design.children_of(domain) {
            let NodeKind::RateChange(rc) = &design.node(child).kind else { continue };
            let node_rate = rc.rate;
            match rate {
                None => rate = Some(node_rate),
                Some(r) if r != node_rate => {
                    return Err(CompileError::Validation {
                        node: design.qualified_name(domain),
                        msg: format!(
                            "conflicting rates {}:{} and {}:{} on domain boundary",
                            r.0, r.1, node_rate.0, node_rate.1
                        ),
                    });
                }
                _ => {}
            }

            // Input-side rate changes are driven from outside the domain.
            let driven_from_outside = design
                .input_arc(child, 0)
                .map(|a| {
                    let src = design.arc(a).src.node;
                    domain_of(design, src) != Some(domain) && src != domain
                })
                .unwrap_or(false);
            if driven_from_outside {
                rc_in.insert(child);
            } else {
                rc_out.insert(child);
            }
        }

        let rate = rate.ok_or_else(|| CompileError::Validation {
            node: design.qualified_name(domain),
            msg: "clock domain has no rate-change nodes".to_string(),
        })?;
        if rate.0 == 0 || rate.1 == 0 {
            return Err(CompileError::Validation {
                node: design.qualified_name(domain),
                msg: format!("degenerate rate {}:{}", rate.0, rate.1),
            });
        }

        if let NodeKind::ClockDomain(cd) = &mut design.node_mut(domain).kind {
            cd.rate = rate;
            cd.rate_change_in = rc_in;
            cd.rate_change_out = rc_out;
        }
        debug!(
            target: "pass.clock",
            domain = %design.qualified_name(domain),
            num = rate.0,
            den = rate.1,
            "rate_rediscovered"
        );
    }
    Ok(())
}

/// Specialize each domain into its upsample or downsample variant and each
/// generic rate-change placeholder into an input/output implementation.
pub fn specialize_clock_domains(design: &mut Design) -> Result<Vec<NodeKey>> {
    let domains = find_clock_domains(design);
    for &domain in &domains {
        let rate = match &design.node(domain).kind {
            NodeKind::ClockDomain(cd) => cd.rate,
            _ => continue,
        };
        let variant = if rate.0 > rate.1 {
            ClockDomainVariant::Upsample
        } else {
            ClockDomainVariant::Downsample
        };
        let (rc_in, rc_out) = match &mut design.node_mut(domain).kind {
            NodeKind::ClockDomain(cd) => {
                cd.variant = variant;
                (cd.rate_change_in.clone(), cd.rate_change_out.clone())
            }
            _ => unreachable!(),
        };

        for key in rc_in {
            if let NodeKind::RateChange(rc) = &mut design.node_mut(key).kind {
                rc.variant = RateChangeVariant::InputImpl;
                rc.domain = Some(domain);
            }
        }
        for key in rc_out {
            if let NodeKind::RateChange(rc) = &mut design.node_mut(key).kind {
                rc.variant = RateChangeVariant::OutputImpl;
                rc.domain = Some(domain);
            }
        }
        info!(
            target: "pass.clock",
            domain = %design.qualified_name(domain),
            variant = ?variant,
            "domain_specialized"
        );
    }
    Ok(domains)
}

/// Create support nodes required by downsample domains: a modulo counter
/// whose strobe gates the domain's context.
pub fn create_clock_domain_support_nodes(design: &mut Design, include_context: bool) -> Result<()> {
    for domain in find_clock_domains(design) {
        let (variant, rate, has_driver) = match &design.node(domain).kind {
            NodeKind::ClockDomain(cd) => (cd.variant, cd.rate, cd.counter_driver.is_some()),
            _ => continue,
        };
        if variant != ClockDomainVariant::Downsample || has_driver {
            continue;
        }
        if rate.1 % rate.0 != 0 {
            return Err(CompileError::Validation {
                node: design.qualified_name(domain),
                msg: format!("downsample rate {}:{} is not integral", rate.0, rate.1),
            });
        }
        let period = (rate.1 / rate.0) as usize;

        let parent = design.node(domain).parent;
        let name = format!("{}_counter", design.node(domain).name);
        let counter =
            design.add_node(name, NodeKind::TickCounter(TickCounter { period }), parent);
        design.node_mut(counter).partition = design.node(domain).partition;
        if include_context {
            design.node_mut(counter).contexts = design.node(domain).contexts.clone();
        }
        if let NodeKind::ClockDomain(cd) = &mut design.node_mut(domain).kind {
            cd.counter_driver = Some(counter);
        }
        debug!(
            target: "pass.clock",
            domain = %design.qualified_name(domain),
            period,
            "support_counter_created"
        );
    }
    Ok(())
}

/// Validate rate-change placement: each rate change sits on the boundary
/// between its domain and the domain one level out; neither side may skip a
/// level.  Master ports inherit the domain of their connected side.
pub fn validate_rates(design: &mut Design) -> Result<()> {
    for key in design.node_keys() {
        let NodeKind::RateChange(rc) = &design.node(key).kind else { continue };
        let own_domain = rc.domain.or_else(|| domain_of(design, key));
        let Some(own_domain) = own_domain else {
            return Err(CompileError::Validation {
                node: design.qualified_name(key),
                msg: "rate change outside any clock domain".to_string(),
            });
        };
        let outer = domain_of(design, own_domain);

        let src_domain = design
            .input_arc(key, 0)
            .map(|a| {
                let src = design.arc(a).src.node;
                if design.node(src).is_master() { outer } else { domain_of(design, src) }
            })
            .unwrap_or(outer);
        let dst_domain = design
            .out_arcs(key)
            .first()
            .map(|a| {
                let dst = design.arc(*a).dst.node;
                if design.node(dst).is_master() { outer } else { domain_of(design, dst) }
            })
            .unwrap_or(outer);

        let ok = match (src_domain == Some(own_domain), dst_domain == Some(own_domain)) {
            // Input side outside, output inside (input rate change), or the
            // symmetric output rate change.
            (false, true) => src_domain == outer,
            (true, false) => dst_domain == outer,
            _ => false,
        };
        if !ok {
            return Err(CompileError::Validation {
                node: design.qualified_name(key),
                msg: "rate change crosses more than one domain level".to_string(),
            });
        }
    }

    assign_master_port_clock_domains(design);
    Ok(())
}

/// Master-node ports inherit the clock domain of the node on their connected
/// side.
pub fn assign_master_port_clock_domains(design: &mut Design) {
    for master in design.master_keys() {
        let mut assignments: Vec<(usize, Option<NodeKey>)> = Vec::new();
        let node = design.node(master);
        for port in &node.outputs {
            for a in &port.arcs {
                let other = design.arc(*a).dst.node;
                assignments.push((port.number as usize, domain_of(design, other)));
            }
        }
        for port in &node.inputs {
            for a in &port.arcs {
                let other = design.arc(*a).src.node;
                assignments.push((port.number as usize, domain_of(design, other)));
            }
        }
        if let NodeKind::Master(m) = &mut design.node_mut(master).kind {
            for (port, dom) in assignments {
                m.set_port_clock_domain(port, dom);
            }
        }
    }
}

/// Clock-domain rates present in each partition, as (numerator, denominator)
/// pairs relative to the base domain.
pub fn find_partition_clock_domain_rates(design: &Design) -> IndexMap<i32, IndexSet<(u32, u32)>> {
    let mut out: IndexMap<i32, IndexSet<(u32, u32)>> = IndexMap::new();
    for key in design.node_keys() {
        let node = design.node(key);
        if node.is_master() || node.is_subsystem_like() {
            continue;
        }
        let rate = effective_rate(design, key);
        out.entry(node.partition).or_default().insert(rate);
    }
    out
}

/// Accumulated rate of the clock-domain chain enclosing a node.
pub fn effective_rate(design: &Design, key: NodeKey) -> (u32, u32) {
    let mut num = 1u32;
    let mut den = 1u32;
    let mut cur = design.node(key).parent;
    while let Some(p) = cur {
        if let NodeKind::ClockDomain(cd) = &design.node(p).kind {
            num *= cd.rate.0;
            den *= cd.rate.1;
        }
        cur = design.node(p).parent;
    }
    let g = gcd(num, den);
    (num / g, den / g)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a.max(1) } else { gcd(b, a % b) }
}

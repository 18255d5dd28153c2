//! Master nodes: the five sentinels at the design boundary.

use crate::node::NodeKey;

/// Which boundary a master node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterRole {
    /// Outputs of this node are the design's inputs.
    Input,
    /// Inputs of this node are the design's outputs.
    Output,
    /// Inputs of this node are signals to visualize.
    Visualization,
    /// Sink for signals that are deliberately discarded.
    Terminator,
    /// Catches dangling ports.
    Unconnected,
}

impl MasterRole {
    pub fn tag(self) -> &'static str {
        match self {
            MasterRole::Input => "MasterInput",
            MasterRole::Output => "MasterOutput",
            MasterRole::Visualization => "MasterVis",
            MasterRole::Terminator => "MasterTerminator",
            MasterRole::Unconnected => "MasterUnconnected",
        }
    }

    /// Reserved node ID (1..=5).
    pub fn reserved_id(self) -> i32 {
        match self {
            MasterRole::Input => 1,
            MasterRole::Output => 2,
            MasterRole::Visualization => 3,
            MasterRole::Terminator => 4,
            MasterRole::Unconnected => 5,
        }
    }

    /// Sinks whose input ports accept arbitrary fan-in.
    pub fn is_many_input_sink(self) -> bool {
        matches!(
            self,
            MasterRole::Output
                | MasterRole::Visualization
                | MasterRole::Terminator
                | MasterRole::Unconnected
        )
    }
}

/// Payload of a master node.  Master ports carry per-port metadata assigned
/// by the rate and blocking passes: the clock domain of the connected side
/// and the block size used at the I/O boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterNode {
    role: MasterRole,
    /// Clock domain of each port, indexed by port number.
    port_clock_domains: Vec<Option<NodeKey>>,
    /// Block size of each port after blocking.
    port_block_sizes: Vec<usize>,
    /// External signal names, indexed by port number.
    port_names: Vec<String>,
}

impl MasterNode {
    pub fn new(role: MasterRole) -> MasterNode {
        MasterNode {
            role,
            port_clock_domains: Vec::new(),
            port_block_sizes: Vec::new(),
            port_names: Vec::new(),
        }
    }

    pub fn role(&self) -> MasterRole {
        self.role
    }

    fn ensure_port(&mut self, port: usize) {
        if self.port_clock_domains.len() <= port {
            self.port_clock_domains.resize(port + 1, None);
            self.port_block_sizes.resize(port + 1, 1);
            self.port_names.resize(port + 1, String::new());
        }
    }

    pub fn set_port_clock_domain(&mut self, port: usize, domain: Option<NodeKey>) {
        self.ensure_port(port);
        self.port_clock_domains[port] = domain;
    }

    pub fn port_clock_domain(&self, port: usize) -> Option<NodeKey> {
        self.port_clock_domains.get(port).copied().flatten()
    }

    pub fn set_port_block_size(&mut self, port: usize, block: usize) {
        self.ensure_port(port);
        self.port_block_sizes[port] = block;
    }

    pub fn port_block_size(&self, port: usize) -> usize {
        self.port_block_sizes.get(port).copied().unwrap_or(1)
    }

    pub fn set_port_name(&mut self, port: usize, name: impl Into<String>) {
        self.ensure_port(port);
        self.port_names[port] = name.into();
    }

    pub fn port_name(&self, port: usize) -> Option<&str> {
        self.port_names.get(port).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Drop all clock-domain links (they are rebuilt by rediscovery).
    pub fn reset_clock_domain_links(&mut self) {
        for d in &mut self.port_clock_domains {
            *d = None;
        }
    }
}

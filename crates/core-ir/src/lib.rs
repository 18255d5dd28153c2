//! Graph intermediate representation for streaming dataflow designs.
//!
//! A [`Design`] holds five master nodes (the design boundary), the node and
//! arc stores, and the top-level node list.  Nodes are polymorphic over a
//! tagged [`NodeKind`](kind::NodeKind) variant; the scheduler and the
//! emitters depend only on the hook methods ([`Node::has_state`],
//! [`Design::emit_value_expression`], ...), never on concrete kinds.

mod algs;
mod arc;
mod context;
mod design;
mod emit;
mod error;
mod kind;
mod node;
mod port;
mod validate;

pub use arc::{ArcData, ArcKey};
pub use context::{common_prefix_len, is_prefix, Context};
pub use design::{Batch, CrossingGroup, Design, GraphCopyMaps};
pub use emit::{node_ident, CodeQueue, EmitState};
pub use error::{CompileError, Result};
pub use kind::*;
pub use node::{Node, NodeKey, PARTITION_IO, PARTITION_UNASSIGNED};
pub use port::{Port, PortKind, PortRef};

//! Graph algorithms over a design.

use ahash::AHashMap;

use crate::design::Design;
use crate::node::NodeKey;

impl Design {
    /// Strongly connected components over the non-master node set, following
    /// data arcs.  Components are returned in reverse topological order of
    /// the condensation; nodes within a component keep discovery order.
    ///
    /// Tarjan's algorithm, iterative to stay safe on deep feedback chains.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeKey>> {
        let masters = self.master_keys();
        let nodes: Vec<NodeKey> =
            self.node_keys().into_iter().filter(|k| !masters.contains(k)).collect();

        let mut index: AHashMap<NodeKey, usize> = AHashMap::new();
        let mut lowlink: AHashMap<NodeKey, usize> = AHashMap::new();
        let mut on_stack: AHashMap<NodeKey, bool> = AHashMap::new();
        let mut stack: Vec<NodeKey> = Vec::new();
        let mut next_index = 0usize;
        let mut components: Vec<Vec<NodeKey>> = Vec::new();

        // Explicit DFS frames: (node, successor cursor).
        enum Frame {
            Enter(NodeKey),
            Resume(NodeKey, usize),
        }

        for start in nodes {
            if index.contains_key(&start) {
                continue;
            }
            let mut frames = vec![Frame::Enter(start)];
            while let Some(frame) = frames.pop() {
                match frame {
                    Frame::Enter(v) => {
                        index.insert(v, next_index);
                        lowlink.insert(v, next_index);
                        next_index += 1;
                        stack.push(v);
                        on_stack.insert(v, true);
                        frames.push(Frame::Resume(v, 0));
                    }
                    Frame::Resume(v, cursor) => {
                        let succs = self.successors_non_master(v);
                        if let Some(&w) = succs.get(cursor) {
                            frames.push(Frame::Resume(v, cursor + 1));
                            if !index.contains_key(&w) {
                                frames.push(Frame::Enter(w));
                            } else if on_stack.get(&w).copied().unwrap_or(false) {
                                let lw = index[&w];
                                let lv = lowlink[&v];
                                lowlink.insert(v, lv.min(lw));
                            }
                        } else {
                            // All successors visited: fold lowlinks upward and
                            // pop a component if v is a root.
                            if let Some(Frame::Resume(parent, _)) = frames.last() {
                                let lv = lowlink[&v];
                                let lp = lowlink[parent];
                                lowlink.insert(*parent, lp.min(lv));
                            }
                            if lowlink[&v] == index[&v] {
                                let mut comp = Vec::new();
                                while let Some(w) = stack.pop() {
                                    on_stack.insert(w, false);
                                    comp.push(w);
                                    if w == v {
                                        break;
                                    }
                                }
                                comp.reverse();
                                components.push(comp);
                            }
                        }
                    }
                }
            }
        }
        components
    }

    fn successors_non_master(&self, key: NodeKey) -> Vec<NodeKey> {
        let masters = self.master_keys();
        let mut out: Vec<NodeKey> = self
            .out_arcs(key)
            .into_iter()
            .map(|a| self.arc(a).dst.node)
            .filter(|n| !masters.contains(n))
            .collect();
        out.dedup();
        out
    }
}

//! Call graph and chain walking
//!
//! Provides algorithms for:
//! - Resolving configuration-function call sites into a directed graph
//! - Walking a test step's call chain with depth and cycle safety
//! - Computing the resources reachable from every chain edge

pub mod resolve;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::index::{DeclRef, SymbolIndex};
use crate::types::CallSite;

pub use resolve::{receiver_struct, resolve_call, CallScope, Resolution};

/// Resolved call from one configuration function to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEdge {
    pub target: DeclRef,
    pub resolution: Resolution,
}

/// A call on a struct-like receiver that no indexed function matched
#[derive(Debug, Clone)]
pub struct UnresolvedCall<'a> {
    pub caller: DeclRef,
    pub site: &'a CallSite,
}

/// Directed graph among configuration functions
pub struct CallGraph<'a> {
    callees: HashMap<DeclRef, Vec<CallEdge>>,
    unresolved: Vec<UnresolvedCall<'a>>,
}

impl<'a> CallGraph<'a> {
    /// Resolve every call site of every indexed configuration function
    pub fn build(index: &SymbolIndex<'a>) -> Self {
        let mut callees: HashMap<DeclRef, Vec<CallEdge>> = HashMap::new();
        let mut unresolved = Vec::new();

        for caller in index.config_refs() {
            let decl = index.config_decl(caller);
            let scope = CallScope {
                file: caller.file,
                receiver_struct: Some(&decl.struct_name),
                bindings: &decl.bindings,
            };

            let mut seen: HashSet<DeclRef> = HashSet::new();
            let edges = callees.entry(caller).or_default();

            for site in &decl.call_sites {
                let resolution = resolve_call(index, site, &scope);
                match resolution.target() {
                    Some(target) => {
                        if seen.insert(target) {
                            edges.push(CallEdge { target, resolution });
                        }
                    }
                    None if site.kind.is_struct_like() => {
                        unresolved.push(UnresolvedCall { caller, site });
                    }
                    None => {}
                }
            }
        }

        debug!(
            "Call graph: {} functions, {} edges, {} unresolved",
            callees.len(),
            callees.values().map(Vec::len).sum::<usize>(),
            unresolved.len()
        );

        Self {
            callees,
            unresolved,
        }
    }

    pub fn callees(&self, caller: DeclRef) -> &[CallEdge] {
        self.callees.get(&caller).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unresolved(&self) -> &[UnresolvedCall<'a>] {
        &self.unresolved
    }

    pub fn edge_count(&self) -> usize {
        self.callees.values().map(Vec::len).sum()
    }
}

/// One edge emitted by a chain walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEdge {
    pub source: DeclRef,
    pub target: DeclRef,
    pub depth: u32,
    pub resolution: Resolution,
    /// Resources mentioned by the target or anything reachable from it
    pub closure: BTreeSet<String>,
}

/// Depth-first chain walker over a [`CallGraph`]
pub struct ChainWalker<'g, 'a> {
    graph: &'g CallGraph<'a>,
    closures: HashMap<DeclRef, BTreeSet<String>>,
}

impl<'g, 'a> ChainWalker<'g, 'a> {
    /// `mentions` maps each function to the resources it names directly
    pub fn new(graph: &'g CallGraph<'a>, mentions: &HashMap<DeclRef, BTreeSet<String>>) -> Self {
        Self {
            graph,
            closures: reachable_resources(graph, mentions),
        }
    }

    /// Resources named by `node` or by anything it can reach
    pub fn closure(&self, node: DeclRef) -> BTreeSet<String> {
        self.closures.get(&node).cloned().unwrap_or_default()
    }

    /// Walk the chain rooted at a step's function.
    ///
    /// The first edge is the root itself at depth 0. Edges into a node on the
    /// current path are dropped; a node already expanded in this walk gets its
    /// edge but is not descended into again.
    pub fn walk(&self, root: DeclRef, root_resolution: Resolution) -> Vec<ChainEdge> {
        let mut edges = vec![ChainEdge {
            source: root,
            target: root,
            depth: 0,
            resolution: root_resolution,
            closure: self.closure(root),
        }];

        let mut expanded: HashSet<DeclRef> = HashSet::from([root]);
        let mut on_path: HashSet<DeclRef> = HashSet::from([root]);
        // (node, depth, next callee)
        let mut frames: Vec<(DeclRef, u32, usize)> = vec![(root, 0, 0)];

        while let Some(&(node, depth, next)) = frames.last() {
            let Some(edge) = self.graph.callees(node).get(next) else {
                frames.pop();
                on_path.remove(&node);
                continue;
            };
            let top = frames.len() - 1;
            frames[top].2 += 1;

            if on_path.contains(&edge.target) {
                continue;
            }

            edges.push(ChainEdge {
                source: node,
                target: edge.target,
                depth: depth + 1,
                resolution: edge.resolution,
                closure: self.closure(edge.target),
            });

            if expanded.insert(edge.target) {
                on_path.insert(edge.target);
                frames.push((edge.target, depth + 1, 0));
            }
        }

        edges
    }
}

/// Closure of every function: the resources it or any reachable function names.
///
/// Tarjan's algorithm, iterative. Components complete sinks first, so every
/// callee outside a component already has its closure when the component
/// is popped, and all members of a cycle share one closure.
fn reachable_resources(
    graph: &CallGraph<'_>,
    mentions: &HashMap<DeclRef, BTreeSet<String>>,
) -> HashMap<DeclRef, BTreeSet<String>> {
    let mut nodes: Vec<DeclRef> = graph.callees.keys().copied().collect();
    nodes.sort();

    let mut order: HashMap<DeclRef, usize> = HashMap::new();
    let mut low: HashMap<DeclRef, usize> = HashMap::new();
    let mut stack: Vec<DeclRef> = Vec::new();
    let mut on_stack: HashSet<DeclRef> = HashSet::new();
    let mut closures: HashMap<DeclRef, BTreeSet<String>> = HashMap::new();

    for start in nodes {
        if order.contains_key(&start) {
            continue;
        }

        let mut frames: Vec<(DeclRef, usize)> = vec![(start, 0)];
        order.insert(start, order.len());
        low.insert(start, order[&start]);
        stack.push(start);
        on_stack.insert(start);

        while let Some(&(node, next)) = frames.last() {
            if let Some(edge) = graph.callees(node).get(next) {
                let top = frames.len() - 1;
                frames[top].1 += 1;

                let target = edge.target;
                match order.get(&target) {
                    None => {
                        order.insert(target, order.len());
                        low.insert(target, order[&target]);
                        stack.push(target);
                        on_stack.insert(target);
                        frames.push((target, 0));
                    }
                    Some(&seen) if on_stack.contains(&target) => {
                        let lowest = low[&node].min(seen);
                        low.insert(node, lowest);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let node_low = low[&node];
            if let Some(&(parent, _)) = frames.last() {
                let lowest = low[&parent].min(node_low);
                low.insert(parent, lowest);
            }
            if node_low != order[&node] {
                continue;
            }

            let mut members = Vec::new();
            while let Some(member) = stack.pop() {
                on_stack.remove(&member);
                members.push(member);
                if member == node {
                    break;
                }
            }

            let mut closure = BTreeSet::new();
            for member in &members {
                if let Some(named) = mentions.get(member) {
                    closure.extend(named.iter().cloned());
                }
                for edge in graph.callees(*member) {
                    if let Some(reached) = closures.get(&edge.target) {
                        closure.extend(reached.iter().cloned());
                    }
                }
            }
            for member in members {
                closures.insert(member, closure.clone());
            }
        }
    }

    closures
}

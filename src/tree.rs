//! Hierarchy construction over flat block lists.
//!
//! [`build_tree`] turns an ordered block sequence into a [`Tree`] using
//! the blocks' parent linkage. Nodes live in an arena owned by the tree
//! and reference their children by index; parent lookup goes through the
//! id index, so no node holds a back-edge.
//!
//! Construction never fails on malformed input: a block whose parent id
//! is absent from the list is adopted under the synthetic root, and
//! repeated ids are kept as distinct nodes. Both conditions are counted
//! in [`TreeDiagnostics`].

use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

use crate::models::Block;

/// Id given to the synthetic root block.
pub const ROOT_ID: &str = "root";

/// One block plus its ordered children (arena indices).
#[derive(Debug, Clone)]
pub struct Node {
    pub block: Block,
    children: Vec<usize>,
}

impl Node {
    fn new(block: Block) -> Self {
        Self {
            block,
            children: Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Counters for input defects observed during construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeDiagnostics {
    /// Blocks whose declared parent id never appeared in the input.
    pub orphaned_blocks: usize,
    /// Block ids seen more than once within one input list.
    pub duplicate_ids: usize,
}

/// Arena-backed document tree with an id index for O(1) lookup.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
    index: HashMap<String, usize>,
    diagnostics: TreeDiagnostics,
}

/// Build a tree from an ordered block sequence.
///
/// Single pass; each node is indexed at creation so later blocks can
/// always find an earlier parent. A block arriving before its parent is
/// buffered and re-attached once the parent appears. Blocks whose parent
/// never appears attach under the synthetic root, in input order.
pub fn build_tree(blocks: &[Block]) -> Tree {
    let root_block = Block {
        id: ROOT_ID.to_string(),
        block_type: "root".to_string(),
        content: String::new(),
        parent_id: None,
        has_children: !blocks.is_empty(),
        indent_level: 0,
    };

    let mut nodes = vec![Node::new(root_block)];
    let mut parents: Vec<usize> = vec![0];
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut diagnostics = TreeDiagnostics::default();

    // Children waiting for a parent id that has not been indexed yet.
    let mut pending: HashMap<String, Vec<usize>> = HashMap::new();

    fn attach(nodes: &mut [Node], parents: &mut [usize], parent_idx: usize, child_idx: usize) {
        nodes[parent_idx].children.push(child_idx);
        parents[child_idx] = parent_idx;
    }

    for block in blocks {
        let idx = nodes.len();
        nodes.push(Node::new(block.clone()));
        parents.push(0);

        match index.entry(block.id.clone()) {
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(idx);
                // Earlier blocks may have been waiting for this id.
                if let Some(waiting) = pending.remove(&block.id) {
                    for child_idx in waiting {
                        attach(&mut nodes, &mut parents, idx, child_idx);
                    }
                }
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                diagnostics.duplicate_ids += 1;
                warn!(block_id = %block.id, "duplicate block id in input list");
            }
        }

        match &block.parent_id {
            None => attach(&mut nodes, &mut parents, 0, idx),
            Some(pid) => match index.get(pid) {
                Some(&parent_idx) => attach(&mut nodes, &mut parents, parent_idx, idx),
                None => pending.entry(pid.clone()).or_default().push(idx),
            },
        }
    }

    // Whatever is still pending has a parent that never appeared: adopt
    // under the root, preserving input order.
    let mut orphans: Vec<usize> = pending.into_values().flatten().collect();
    orphans.sort_unstable();
    for idx in orphans {
        diagnostics.orphaned_blocks += 1;
        warn!(block_id = %nodes[idx].block.id, "parent id never appeared; adopting at root");
        attach(&mut nodes, &mut parents, 0, idx);
    }

    // Cyclic linkage (a block ancestored by itself) leaves nodes
    // unreachable from the root. Break each cycle at its entry edge and
    // adopt the node at the root so every block stays reachable.
    let mut visited = vec![false; nodes.len()];
    mark_reachable(&nodes, 0, &mut visited);
    for idx in 1..nodes.len() {
        if visited[idx] {
            continue;
        }
        diagnostics.orphaned_blocks += 1;
        warn!(block_id = %nodes[idx].block.id, "cyclic parent linkage; adopting at root");
        let old_parent = parents[idx];
        nodes[old_parent].children.retain(|&c| c != idx);
        attach(&mut nodes, &mut parents, 0, idx);
        mark_reachable(&nodes, idx, &mut visited);
    }

    Tree {
        nodes,
        root: 0,
        index,
        diagnostics,
    }
}

fn mark_reachable(nodes: &[Node], start: usize, visited: &mut [bool]) {
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        stack.extend(nodes[idx].children.iter().copied());
    }
}

impl Tree {
    /// The synthetic root node.
    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    /// Number of real (non-root) nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn diagnostics(&self) -> TreeDiagnostics {
        self.diagnostics
    }

    /// O(1) lookup by block id. `None` means the id was never indexed,
    /// which is distinct from finding a node with empty content.
    pub fn find_node_by_id(&self, block_id: &str) -> Option<&Node> {
        self.index.get(block_id).map(|&idx| &self.nodes[idx])
    }

    /// Ordered children of a node.
    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.children.iter().map(move |&idx| &self.nodes[idx])
    }

    /// All nodes matching a block type, in pre-order.
    pub fn find_nodes_by_type(&self, block_type: &str) -> Vec<&Node> {
        self.iter_preorder()
            .filter(|n| n.block.block_type == block_type)
            .collect()
    }

    /// All nodes whose content matches the pattern, in pre-order.
    /// An empty result is not an error.
    pub fn find_nodes_by_content(&self, pattern: &Regex) -> Vec<&Node> {
        self.iter_preorder()
            .filter(|n| pattern.is_match(&n.block.content))
            .collect()
    }

    /// Pre-order traversal of the real nodes (synthetic root excluded).
    pub fn iter_preorder(&self) -> PreorderIter<'_> {
        let mut stack = Vec::with_capacity(self.nodes[self.root].children.len());
        for &child in self.nodes[self.root].children.iter().rev() {
            stack.push(child);
        }
        PreorderIter { tree: self, stack }
    }
}

pub struct PreorderIter<'a> {
    tree: &'a Tree,
    stack: Vec<usize>,
}

impl<'a> Iterator for PreorderIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = &self.tree.nodes[idx];
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

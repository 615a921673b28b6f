use crate::Node;

/// Number of nodes in the subtree rooted at `node`, the root included.
///
/// Walks with an explicit stack so arbitrarily deep payloads cannot exhaust
/// the call stack. `None` counts as an empty tree.
pub fn count_nodes(node: Option<&Node>) -> usize {
    let Some(root) = node else {
        return 0;
    };

    let mut stack = vec![root];
    let mut total = 0usize;
    while let Some(current) = stack.pop() {
        total += 1;
        stack.extend(current.children.iter());
    }
    total
}

/// Descendants of `node`, excluding the node itself.
pub fn team_size(node: &Node) -> u64 {
    count_nodes(Some(node)).saturating_sub(1) as u64
}

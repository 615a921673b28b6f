use genealogy_core::{Node, NodeId, PreferredSource, Source};

/// A tree fetch as issued by the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRequest {
    /// Operator view. With neither `identifier` nor `root_node_id` the
    /// configured default admin root is used.
    Admin {
        identifier: Option<String>,
        root_node_id: Option<NodeId>,
        max_depth: u32,
        preferred_source: PreferredSource,
    },
    /// Member view over the sponsor tree. No root means the caller's own.
    SelfScoped {
        root_node_id: Option<NodeId>,
        max_depth: u32,
    },
}

impl TreeRequest {
    pub fn admin_search(
        identifier: impl Into<String>,
        max_depth: u32,
        preferred_source: PreferredSource,
    ) -> Self {
        TreeRequest::Admin {
            identifier: Some(identifier.into()),
            root_node_id: None,
            max_depth,
            preferred_source,
        }
    }

    pub fn admin_root(root_node_id: NodeId, max_depth: u32, preferred_source: PreferredSource) -> Self {
        TreeRequest::Admin {
            identifier: None,
            root_node_id: Some(root_node_id),
            max_depth,
            preferred_source,
        }
    }

    pub fn admin_default(max_depth: u32, preferred_source: PreferredSource) -> Self {
        TreeRequest::Admin {
            identifier: None,
            root_node_id: None,
            max_depth,
            preferred_source,
        }
    }

    pub fn own(root_node_id: Option<NodeId>, max_depth: u32) -> Self {
        TreeRequest::SelfScoped {
            root_node_id,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> u32 {
        match self {
            TreeRequest::Admin { max_depth, .. } | TreeRequest::SelfScoped { max_depth, .. } => {
                *max_depth
            }
        }
    }
}

/// The authoritative tree for a request and the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeResult {
    pub root: Node,
    pub source: Source,
    /// Levels the fetch covered, root included.
    pub max_depth: u32,
}

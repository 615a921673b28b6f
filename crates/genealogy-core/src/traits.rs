use crate::{Node, NodeId, PreferredSource, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Parameters of a matrix-tree request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatrixTreeQuery {
    pub root_node_id: Option<NodeId>,
    pub identifier: Option<String>,
    pub max_depth: u32,
    /// Rendering variant the server applies to the matrix tree.
    pub source: PreferredSource,
}

impl MatrixTreeQuery {
    /// Stable key covering every parameter of the request.
    pub fn cache_key(&self) -> String {
        format!(
            "matrix|root={}|identifier={}|depth={}|source={}",
            self.root_node_id.as_ref().map(NodeId::as_str).unwrap_or(""),
            self.identifier.as_deref().unwrap_or(""),
            self.max_depth,
            self.source
        )
    }
}

/// Parameters of a sponsor-tree request. No root means the caller's own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SponsorTreeQuery {
    pub root_node_id: Option<NodeId>,
    pub max_depth: u32,
}

impl SponsorTreeQuery {
    pub fn cache_key(&self) -> String {
        format!(
            "sponsor|root={}|depth={}",
            self.root_node_id.as_ref().map(NodeId::as_str).unwrap_or(""),
            self.max_depth
        )
    }
}

/// The remote genealogy endpoints, one method per call.
#[async_trait]
pub trait TreeBackend: Send + Sync {
    async fn matrix_tree(&self, query: &MatrixTreeQuery) -> Result<Node>;

    async fn sponsor_tree(&self, query: &SponsorTreeQuery) -> Result<Node>;

    /// Resolve a sanitized identifier to the member's node id.
    async fn resolve_root(&self, identifier: &str) -> Result<NodeId>;

    /// Root shown to admins who have not searched for anyone yet.
    async fn default_admin_root(&self) -> Result<NodeId>;
}

#[async_trait]
impl<T: TreeBackend + ?Sized> TreeBackend for Arc<T> {
    async fn matrix_tree(&self, query: &MatrixTreeQuery) -> Result<Node> {
        (**self).matrix_tree(query).await
    }

    async fn sponsor_tree(&self, query: &SponsorTreeQuery) -> Result<Node> {
        (**self).sponsor_tree(query).await
    }

    async fn resolve_root(&self, identifier: &str) -> Result<NodeId> {
        (**self).resolve_root(identifier).await
    }

    async fn default_admin_root(&self) -> Result<NodeId> {
        (**self).default_admin_root().await
    }
}

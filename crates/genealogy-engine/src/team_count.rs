use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use genealogy_client::{TreeRequest, TreeSourceClient};
use genealogy_core::{team_size, NodeId, Result, TreeBackend};
use std::future::Future;
use std::sync::Arc;

/// Where team sizes for nodes outside the current tree come from.
#[async_trait]
pub trait TeamCountProvider: Send + Sync {
    /// `request` is the tree request that would open `node_id` in the
    /// current view.
    async fn team_count(&self, node_id: &NodeId, request: &TreeRequest) -> Result<u64>;
}

/// Issues the view's own tree request for the node, fallback included, and
/// counts the returned root. Counts therefore come from the same hierarchy
/// that seeding reads.
pub struct SubtreeTeamCount<B> {
    client: TreeSourceClient<B>,
}

impl<B: TreeBackend> SubtreeTeamCount<B> {
    pub fn new(client: TreeSourceClient<B>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<B: TreeBackend> TeamCountProvider for SubtreeTeamCount<B> {
    async fn team_count(&self, _node_id: &NodeId, request: &TreeRequest) -> Result<u64> {
        let result = self.client.fetch_tree(request).await?;
        Ok(team_size(&result.root))
    }
}

pub type CountFuture = BoxFuture<'static, Result<u64>>;

/// Count hook supplied by the embedding application, typically a cheaper
/// server-side aggregate. Applies to every source.
#[derive(Clone)]
pub struct CountOverride {
    hook: Arc<dyn Fn(NodeId) -> CountFuture + Send + Sync>,
}

impl CountOverride {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(NodeId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64>> + Send + 'static,
    {
        Self {
            hook: Arc::new(move |node_id| hook(node_id).boxed()),
        }
    }
}

#[async_trait]
impl TeamCountProvider for CountOverride {
    async fn team_count(&self, node_id: &NodeId, _request: &TreeRequest) -> Result<u64> {
        (self.hook)(node_id.clone()).await
    }
}

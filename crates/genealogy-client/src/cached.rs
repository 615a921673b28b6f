use async_trait::async_trait;
use genealogy_cache::{CacheStats, RequestCache};
use genealogy_core::{MatrixTreeQuery, Node, NodeId, Result, SponsorTreeQuery, TreeBackend};
use std::time::Duration;

/// Wraps a backend with a short-lived response memo.
///
/// Only successful responses are stored; failures always reach the inner
/// backend again on the next call.
pub struct CachedTreeBackend<B> {
    inner: B,
    trees: RequestCache<Node>,
    roots: RequestCache<NodeId>,
}

impl<B: TreeBackend> CachedTreeBackend<B> {
    pub fn new(inner: B, ttl: Duration) -> Self {
        Self {
            inner,
            trees: RequestCache::new(ttl),
            roots: RequestCache::new(ttl),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Combined statistics of the tree and root memos.
    pub fn stats(&self) -> CacheStats {
        let trees = self.trees.stats();
        let roots = self.roots.stats();
        CacheStats {
            hits: trees.hits + roots.hits,
            misses: trees.misses + roots.misses,
            evictions: trees.evictions + roots.evictions,
            entries: trees.entries + roots.entries,
        }
    }

    pub fn clear(&self) {
        self.trees.clear();
        self.roots.clear();
    }
}

#[async_trait]
impl<B: TreeBackend> TreeBackend for CachedTreeBackend<B> {
    async fn matrix_tree(&self, query: &MatrixTreeQuery) -> Result<Node> {
        let key = query.cache_key();
        if let Some(tree) = self.trees.get(&key) {
            return Ok(tree);
        }
        let tree = self.inner.matrix_tree(query).await?;
        self.trees.insert(key, tree.clone());
        Ok(tree)
    }

    async fn sponsor_tree(&self, query: &SponsorTreeQuery) -> Result<Node> {
        let key = query.cache_key();
        if let Some(tree) = self.trees.get(&key) {
            return Ok(tree);
        }
        let tree = self.inner.sponsor_tree(query).await?;
        self.trees.insert(key, tree.clone());
        Ok(tree)
    }

    async fn resolve_root(&self, identifier: &str) -> Result<NodeId> {
        let key = format!("resolve|identifier={}", identifier);
        if let Some(id) = self.roots.get(&key) {
            return Ok(id);
        }
        let id = self.inner.resolve_root(identifier).await?;
        self.roots.insert(key, id.clone());
        Ok(id)
    }

    async fn default_admin_root(&self) -> Result<NodeId> {
        const KEY: &str = "default-root";
        if let Some(id) = self.roots.get(KEY) {
            return Ok(id);
        }
        let id = self.inner.default_admin_root().await?;
        self.roots.insert(KEY, id.clone());
        Ok(id)
    }
}

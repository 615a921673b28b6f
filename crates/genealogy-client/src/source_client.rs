use crate::{TreeRequest, TreeResult};
use genealogy_core::{
    reconcile, GenealogyError, MatrixTreeQuery, Node, NodeId, PreferredSource, Result, Source,
    SponsorTreeQuery, TreeBackend,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Issues tree requests against a [`TreeBackend`] and applies the dual-source
/// fallback policy.
pub struct TreeSourceClient<B> {
    backend: Arc<B>,
}

impl<B> Clone for TreeSourceClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: TreeBackend> TreeSourceClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub async fn fetch_tree(&self, request: &TreeRequest) -> Result<TreeResult> {
        match request {
            TreeRequest::Admin {
                identifier,
                root_node_id,
                max_depth,
                preferred_source,
            } => {
                self.fetch_admin(
                    identifier.as_deref(),
                    root_node_id.as_ref(),
                    *max_depth,
                    *preferred_source,
                )
                .await
            }
            TreeRequest::SelfScoped {
                root_node_id,
                max_depth,
            } => {
                let query = SponsorTreeQuery {
                    root_node_id: root_node_id.clone(),
                    max_depth: *max_depth,
                };
                let root = self.backend.sponsor_tree(&query).await?;
                Ok(TreeResult {
                    root,
                    source: Source::Sponsor,
                    max_depth: *max_depth,
                })
            }
        }
    }

    async fn fetch_admin(
        &self,
        identifier: Option<&str>,
        root_node_id: Option<&NodeId>,
        max_depth: u32,
        preferred: PreferredSource,
    ) -> Result<TreeResult> {
        let identifier = identifier.map(str::trim).filter(|s| !s.is_empty());

        let root_node_id = match (identifier, root_node_id) {
            (None, None) => Some(self.backend.default_admin_root().await.map_err(|e| {
                GenealogyError::MissingRoot(format!("no identifier given and default root lookup failed: {}", e))
            })?),
            (_, root) => root.cloned(),
        };

        let query = MatrixTreeQuery {
            root_node_id: root_node_id.clone(),
            identifier: identifier.map(str::to_string),
            max_depth,
            source: preferred,
        };
        let matrix = self.backend.matrix_tree(&query).await;

        if !preferred.permits_fallback() {
            return matrix.map(|root| TreeResult {
                root,
                source: Source::Matrix,
                max_depth,
            });
        }

        let (matrix, matrix_error) = match matrix {
            Ok(node) if !node.is_leaf() => {
                let (root, source) = reconcile(Some(node), None, preferred)
                    .ok_or_else(|| GenealogyError::NotFound("empty matrix result".to_string()))?;
                return Ok(TreeResult {
                    root,
                    source,
                    max_depth,
                });
            }
            Ok(node) => (Some(node), None),
            Err(e) => {
                warn!("Matrix tree fetch failed, trying sponsor tree: {}", e);
                (None, Some(e))
            }
        };

        let sponsor = match self
            .fallback_root(root_node_id.as_ref(), matrix.as_ref(), identifier)
            .await
        {
            Some(id) => {
                debug!("Falling back to sponsor tree for {}", id);
                let query = SponsorTreeQuery {
                    root_node_id: Some(id),
                    max_depth,
                };
                match self.backend.sponsor_tree(&query).await {
                    Ok(node) => Some(node),
                    Err(e) => {
                        warn!("Sponsor tree fallback failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        match reconcile(matrix, sponsor, preferred) {
            Some((root, source)) => {
                if source == Source::Sponsor {
                    info!("Showing sponsor tree for {}", root.id);
                }
                Ok(TreeResult {
                    root,
                    source,
                    max_depth,
                })
            }
            None => Err(matrix_error
                .unwrap_or_else(|| GenealogyError::NotFound("no tree available".to_string()))),
        }
    }

    /// Node id for the sponsor fallback: the explicit root, then the id of the
    /// childless matrix result, then a lookup by identifier.
    async fn fallback_root(
        &self,
        root_node_id: Option<&NodeId>,
        matrix: Option<&Node>,
        identifier: Option<&str>,
    ) -> Option<NodeId> {
        if let Some(id) = root_node_id {
            return Some(id.clone());
        }
        if let Some(node) = matrix {
            return Some(node.id.clone());
        }
        let identifier = identifier?;
        match self.backend.resolve_root(identifier).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not resolve root for '{}': {}", identifier, e);
                None
            }
        }
    }
}

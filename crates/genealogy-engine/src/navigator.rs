use crate::{CountOverride, NavOutcome, NavStatus, NavigationState, SubtreeTeamCount, TeamCountProvider};
use genealogy_cache::AggregateCache;
use genealogy_client::{TreeRequest, TreeResult, TreeSourceClient};
use genealogy_core::{
    require_identifier, team_size, BreadcrumbEntry, GenealogyError, NavigationConfig, Node, NodeId,
    PreferredSource, Result, TreeBackend, ViewMode,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a successful fetch commits alongside the new root.
struct Staged {
    breadcrumbs: Vec<BreadcrumbEntry>,
    preferred_source: PreferredSource,
}

/// Drives the genealogy view: fetches, reconciles, seeds team counts and
/// keeps the breadcrumb trail.
///
/// Every action takes a new sequence number and cancels the fetch of the
/// action before it. A response is applied only while its sequence number is
/// still the latest, so a slow superseded fetch can never overwrite the state
/// of a newer one. Failed fetches leave the current root and breadcrumbs as
/// they were.
pub struct GenealogyNavigator<B> {
    client: TreeSourceClient<B>,
    counts: Arc<dyn TeamCountProvider>,
    cache: AggregateCache,
    config: NavigationConfig,
    state: Mutex<NavigationState>,
    sequence: AtomicU64,
    inflight: Mutex<Option<CancellationToken>>,
}

impl<B: TreeBackend + 'static> GenealogyNavigator<B> {
    pub fn new(client: TreeSourceClient<B>, config: NavigationConfig) -> Self {
        let counts = Arc::new(SubtreeTeamCount::new(client.clone()));
        let state = NavigationState::new(config.mode, config.preferred_source);
        Self {
            client,
            counts,
            cache: AggregateCache::new(),
            config,
            state: Mutex::new(state),
            sequence: AtomicU64::new(0),
            inflight: Mutex::new(None),
        }
    }

    /// Share a team-count cache with other collaborators of the same view.
    pub fn with_cache(mut self, cache: AggregateCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_count_provider(mut self, provider: Arc<dyn TeamCountProvider>) -> Self {
        self.counts = provider;
        self
    }

    pub fn with_count_override(self, hook: CountOverride) -> Self {
        self.with_count_provider(Arc::new(hook))
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn client(&self) -> &TreeSourceClient<B> {
        &self.client
    }

    pub fn cache(&self) -> &AggregateCache {
        &self.cache
    }

    /// Snapshot of the current navigation state.
    pub fn state(&self) -> NavigationState {
        self.state.lock().clone()
    }

    /// Children of the current root that are on screen, in server order.
    pub fn displayed_children(&self) -> Vec<Node> {
        self.state
            .lock()
            .current_root
            .as_ref()
            .map(|root| root.displayed_children(self.config.branching_factor).to_vec())
            .unwrap_or_default()
    }

    /// Initial load. Self mode always loads the caller's own tree; admin mode
    /// loads the default root only when configured to.
    pub async fn mount(&self) -> NavOutcome {
        let preferred_source = self.state.lock().preferred_source;
        let request = match self.config.mode {
            ViewMode::SelfScoped => TreeRequest::own(None, self.config.max_depth),
            ViewMode::Admin if self.config.auto_load_default_root => {
                TreeRequest::admin_default(self.config.max_depth, preferred_source)
            }
            ViewMode::Admin => return NavOutcome::Ignored,
        };
        self.navigate(request, Staged {
            breadcrumbs: Vec::new(),
            preferred_source,
        })
        .await
    }

    /// Admin search by free-text identifier. Resets the breadcrumb trail on
    /// success.
    pub async fn search(&self, raw: &str) -> NavOutcome {
        if self.config.mode != ViewMode::Admin {
            return self.reject(GenealogyError::InvalidRequest(
                "Search is only available in admin mode".to_string(),
            ));
        }
        let identifier = match require_identifier(raw) {
            Ok(identifier) => identifier,
            Err(e) => return self.reject(e),
        };

        let preferred_source = self.state.lock().preferred_source;
        let request =
            TreeRequest::admin_search(identifier, self.config.max_depth, preferred_source);
        self.navigate(request, Staged {
            breadcrumbs: Vec::new(),
            preferred_source,
        })
        .await
    }

    /// Make `child_id` the new root, pushing the current root onto the trail.
    pub async fn drill_down(&self, child_id: &NodeId) -> NavOutcome {
        let (request, staged) = {
            let state = self.state.lock();
            let Some(root) = &state.current_root else {
                return NavOutcome::Ignored;
            };
            let mut breadcrumbs = state.breadcrumbs.clone();
            breadcrumbs.push(root.breadcrumb());
            (
                self.root_request(child_id.clone(), state.preferred_source),
                Staged {
                    breadcrumbs,
                    preferred_source: state.preferred_source,
                },
            )
        };
        self.navigate(request, staged).await
    }

    /// Return to the ancestor at `index`, dropping it and everything after
    /// it from the trail.
    pub async fn jump_to_breadcrumb(&self, index: usize) -> NavOutcome {
        let (request, staged) = {
            let state = self.state.lock();
            let Some(entry) = state.breadcrumbs.get(index) else {
                return NavOutcome::Ignored;
            };
            (
                self.root_request(entry.id.clone(), state.preferred_source),
                Staged {
                    breadcrumbs: state.breadcrumbs[..index].to_vec(),
                    preferred_source: state.preferred_source,
                },
            )
        };
        self.navigate(request, staged).await
    }

    pub async fn back(&self) -> NavOutcome {
        let len = self.state.lock().breadcrumbs.len();
        if len == 0 {
            return NavOutcome::Ignored;
        }
        self.jump_to_breadcrumb(len - 1).await
    }

    /// Re-fetch the current root under another preferred source, keeping the
    /// trail. The preference only sticks if the fetch succeeds.
    pub async fn switch_source(&self, preferred_source: PreferredSource) -> NavOutcome {
        if self.config.mode != ViewMode::Admin {
            return self.reject(GenealogyError::InvalidRequest(
                "Self view always shows the sponsor tree".to_string(),
            ));
        }

        let (request, staged) = {
            let mut state = self.state.lock();
            let Some(root_id) = state.current_root.as_ref().map(|root| root.id.clone()) else {
                state.preferred_source = preferred_source;
                return NavOutcome::Ignored;
            };
            (
                self.root_request(root_id, preferred_source),
                Staged {
                    breadcrumbs: state.breadcrumbs.clone(),
                    preferred_source,
                },
            )
        };
        self.navigate(request, staged).await
    }

    /// Fetch the current root again. With nothing loaded yet this is a mount.
    pub async fn refresh(&self) -> NavOutcome {
        let current = {
            let state = self.state.lock();
            state.current_root.as_ref().map(|root| {
                (
                    self.root_request(root.id.clone(), state.preferred_source),
                    Staged {
                        breadcrumbs: state.breadcrumbs.clone(),
                        preferred_source: state.preferred_source,
                    },
                )
            })
        };
        match current {
            Some((request, staged)) => self.navigate(request, staged).await,
            None => self.mount().await,
        }
    }

    /// Cached team size under the active source; `None` until known.
    pub fn team_size(&self, node_id: &NodeId) -> Option<u64> {
        let source = self.state.lock().active_source;
        self.cache.get(source, node_id)
    }

    /// Team size for a node that may not be cached yet.
    ///
    /// Never fails: a failed lookup yields 0 and leaves the cache unset so a
    /// later call tries again.
    pub async fn fetch_team_count(&self, node_id: &NodeId) -> u64 {
        let (source, preferred_source) = {
            let state = self.state.lock();
            (state.active_source, state.preferred_source)
        };
        if let Some(count) = self.cache.get(source, node_id) {
            return count;
        }

        let request = self.root_request(node_id.clone(), preferred_source);
        match self.counts.team_count(node_id, &request).await {
            Ok(count) => {
                self.cache.put(source, node_id.clone(), count);
                count
            }
            Err(e) => {
                warn!("Team count for {} unavailable: {}", node_id, e);
                0
            }
        }
    }

    fn root_request(&self, root: NodeId, preferred_source: PreferredSource) -> TreeRequest {
        match self.config.mode {
            ViewMode::Admin => TreeRequest::admin_root(root, self.config.max_depth, preferred_source),
            ViewMode::SelfScoped => TreeRequest::own(Some(root), self.config.max_depth),
        }
    }

    async fn navigate(&self, request: TreeRequest, staged: Staged) -> NavOutcome {
        let (seq, token) = self.begin();
        debug!("Navigation #{}: {:?}", seq, request);

        let fetched = tokio::select! {
            _ = token.cancelled() => {
                debug!("Navigation #{} cancelled by a newer action", seq);
                return NavOutcome::Superseded;
            }
            result = self.client.fetch_tree(&request) => result,
        };

        self.finish(seq, fetched, staged)
    }

    /// Claim the next sequence number and cancel whatever was in flight.
    fn begin(&self) -> (u64, CancellationToken) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let previous = self.inflight.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.state.lock().status = NavStatus::Loading;
        (seq, token)
    }

    fn finish(&self, seq: u64, fetched: Result<TreeResult>, staged: Staged) -> NavOutcome {
        let mut state = self.state.lock();
        if self.sequence.load(Ordering::SeqCst) != seq {
            warn!("Discarding stale response for navigation #{}", seq);
            return NavOutcome::Superseded;
        }
        self.inflight.lock().take();

        match fetched {
            Ok(tree) => {
                self.seed(&tree);
                info!(
                    "Showing {} ({} tree, {} crumbs)",
                    tree.root.id,
                    tree.source,
                    staged.breadcrumbs.len()
                );
                state.current_root = Some(tree.root);
                state.breadcrumbs = staged.breadcrumbs;
                state.active_source = tree.source;
                state.preferred_source = staged.preferred_source;
                state.status = NavStatus::Loaded;
                state.error = None;
                NavOutcome::Loaded
            }
            Err(e) => {
                warn!("Navigation #{} failed: {}", seq, e);
                let message = e.to_string();
                state.status = NavStatus::Error(message.clone());
                state.error = Some(message);
                NavOutcome::Failed(e)
            }
        }
    }

    /// Fail an action before any request is made. Counts as the latest action.
    fn reject(&self, error: GenealogyError) -> NavOutcome {
        let (seq, _token) = self.begin();
        self.finish(seq, Err(error), Staged {
            breadcrumbs: Vec::new(),
            preferred_source: PreferredSource::default(),
        })
    }

    /// Store team sizes for the new root and its displayed children from the
    /// tree just fetched.
    fn seed(&self, tree: &TreeResult) {
        let root = &tree.root;
        self.cache
            .record(tree.source, root.id.clone(), team_size(root), tree.max_depth);
        for child in root.displayed_children(self.config.branching_factor) {
            self.cache.record(
                tree.source,
                child.id.clone(),
                team_size(child),
                tree.max_depth.saturating_sub(1),
            );
        }
    }
}

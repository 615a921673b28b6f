use genealogy_core::{BreadcrumbEntry, GenealogyError, Node, PreferredSource, Source, ViewMode};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum NavStatus {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Everything the rendering layer reads. Owned by the navigator; consumers
/// get snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub current_root: Option<Node>,
    /// Ancestors drilled through, oldest first.
    pub breadcrumbs: Vec<BreadcrumbEntry>,
    pub active_source: Source,
    pub preferred_source: PreferredSource,
    pub status: NavStatus,
    pub error: Option<String>,
}

impl NavigationState {
    pub fn new(mode: ViewMode, preferred_source: PreferredSource) -> Self {
        let active_source = match mode {
            ViewMode::Admin => Source::Matrix,
            ViewMode::SelfScoped => Source::Sponsor,
        };
        Self {
            current_root: None,
            breadcrumbs: Vec::new(),
            active_source,
            preferred_source,
            status: NavStatus::Idle,
            error: None,
        }
    }

    pub fn loading(&self) -> bool {
        self.status == NavStatus::Loading
    }
}

/// Result of a navigation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The fetched tree is now the current root.
    Loaded,
    /// The fetch failed; the previous tree and trail are still shown.
    Failed(GenealogyError),
    /// A newer action started before this one finished; nothing was applied.
    Superseded,
    /// Nothing to do (no trail to go back on, index out of range, ...).
    Ignored,
}

impl NavOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, NavOutcome::Loaded)
    }
}

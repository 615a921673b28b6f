use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque member identifier, shared by both hierarchy sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The hierarchy a tree was rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Capped-branching placement hierarchy.
    Matrix,
    /// Who-referred-whom hierarchy.
    Sponsor,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Matrix => "matrix",
            Source::Sponsor => "sponsor",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source requested by an admin caller.
///
/// `Matrix` is strict; `Sponsor` and `Auto` both start from the matrix
/// endpoint and may fall back to the sponsor tree when it comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredSource {
    Matrix,
    Sponsor,
    #[default]
    Auto,
}

impl PreferredSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredSource::Matrix => "matrix",
            PreferredSource::Sponsor => "sponsor",
            PreferredSource::Auto => "auto",
        }
    }

    pub fn permits_fallback(&self) -> bool {
        !matches!(self, PreferredSource::Matrix)
    }
}

impl fmt::Display for PreferredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferredSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "matrix" => Ok(PreferredSource::Matrix),
            "sponsor" => Ok(PreferredSource::Sponsor),
            "auto" => Ok(PreferredSource::Auto),
            other => Err(format!(
                "Invalid source: {}. Must be one of: matrix, sponsor, auto",
                other
            )),
        }
    }
}

/// Who is looking at the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Operator view: any root, either source, identifier search.
    #[default]
    #[serde(rename = "admin")]
    Admin,
    /// Member view: sponsor tree only, scoped server-side to the caller.
    #[serde(rename = "self")]
    SelfScoped,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Admin => f.write_str("admin"),
            ViewMode::SelfScoped => f.write_str("self"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(ViewMode::Admin),
            "self" => Ok(ViewMode::SelfScoped),
            other => Err(format!("Invalid mode: {}. Must be one of: admin, self", other)),
        }
    }
}

/// A member and the part of their downline that came back with the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub username: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            full_name: None,
            children: Vec::new(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The first `branching_factor` children, in server order.
    pub fn displayed_children(&self, branching_factor: usize) -> &[Node] {
        let end = self.children.len().min(branching_factor);
        &self.children[..end]
    }

    pub fn child(&self, id: &NodeId) -> Option<&Node> {
        self.children.iter().find(|c| &c.id == id)
    }

    pub fn breadcrumb(&self) -> BreadcrumbEntry {
        BreadcrumbEntry {
            id: self.id.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }

    /// Label shown to operators: full name when known, username otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// An ancestor the user drilled through, oldest first in the trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbEntry {
    pub id: NodeId,
    pub username: String,
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide_node() -> Node {
        Node::new("root", "root").with_children(
            (0..7)
                .map(|i| Node::new(format!("c{}", i), format!("user{}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_displayed_children_keeps_server_order() {
        let node = wide_node();
        let shown: Vec<&str> = node
            .displayed_children(5)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(shown, vec!["c0", "c1", "c2", "c3", "c4"]);
        assert_eq!(node.displayed_children(10).len(), 7);
    }

    #[test]
    fn test_preferred_source_parsing() {
        assert_eq!("AUTO".parse::<PreferredSource>(), Ok(PreferredSource::Auto));
        assert_eq!(
            " sponsor ".parse::<PreferredSource>(),
            Ok(PreferredSource::Sponsor)
        );
        assert!("placement".parse::<PreferredSource>().is_err());
        assert!(!PreferredSource::Matrix.permits_fallback());
        assert!(PreferredSource::Auto.permits_fallback());
    }

    #[test]
    fn test_view_mode_serde_names() {
        let mode: ViewMode = serde_json::from_str("\"self\"").unwrap();
        assert_eq!(mode, ViewMode::SelfScoped);
        assert_eq!(serde_json::to_string(&ViewMode::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let node = Node::new("A", "alice");
        assert_eq!(node.display_name(), "alice");
        let node = node.with_full_name("Alice Doe");
        assert_eq!(node.display_name(), "Alice Doe");
        assert_eq!(node.breadcrumb().full_name.as_deref(), Some("Alice Doe"));
    }
}

//! Normalization of upstream tree payloads.
//!
//! Deployments disagree on field names, numeric vs. string ids and whether
//! empty collections are sent as `null`. Everything is funneled through
//! [`RawNode`] and [`normalize`] here so the rest of the engine only ever
//! sees a fully-populated [`Node`].

use crate::{GenealogyError, Node, NodeId, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Tree node as sent by the server, every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default, alias = "_id", alias = "nodeId", alias = "node_id")]
    pub id: Option<Value>,
    #[serde(default, alias = "userName", alias = "user_name")]
    pub username: Option<String>,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<RawNode>>,
}

/// Reply of the root-resolution endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRootRef {
    #[serde(default, alias = "_id", alias = "nodeId", alias = "node_id")]
    pub id: Option<Value>,
}

fn id_from_value(value: Option<&Value>) -> Option<NodeId> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(NodeId::new(s.trim())),
        Value::Number(n) => Some(NodeId::new(n.to_string())),
        _ => None,
    }
}

/// Convert a raw payload into a strict [`Node`].
///
/// The root must carry an id. Children without an id, and any repeat of an
/// id already seen in this payload, are dropped so ids stay unique.
pub fn normalize(raw: RawNode) -> Result<Node> {
    let mut seen = HashSet::new();
    let root_id = id_from_value(raw.id.as_ref())
        .ok_or_else(|| GenealogyError::NotFound("Tree payload has no root id".to_string()))?;
    seen.insert(root_id.clone());
    Ok(build(root_id, raw, &mut seen))
}

// serde_json refuses input nested deeper than its recursion limit, so the
// recursion here is bounded by that.
fn build(id: NodeId, raw: RawNode, seen: &mut HashSet<NodeId>) -> Node {
    let children = raw
        .children
        .unwrap_or_default()
        .into_iter()
        .filter_map(|child| {
            let Some(child_id) = id_from_value(child.id.as_ref()) else {
                debug!("Dropping child of {} without an id", id);
                return None;
            };
            if !seen.insert(child_id.clone()) {
                warn!("Dropping repeated node {} under {}", child_id, id);
                return None;
            }
            Some(build(child_id, child, seen))
        })
        .collect();

    Node {
        id,
        username: raw.username.unwrap_or_default(),
        full_name: raw.full_name.filter(|n| !n.trim().is_empty()),
        children,
    }
}

/// Parse and normalize a tree response body.
pub fn parse_tree(body: &str) -> Result<Node> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(GenealogyError::NotFound(
            "Server returned an empty tree".to_string(),
        ));
    }
    let raw: RawNode = serde_json::from_str(trimmed)?;
    normalize(raw)
}

/// Parse a `{ "id": ... }` root-resolution response body.
pub fn parse_root_ref(body: &str) -> Result<NodeId> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(GenealogyError::NotFound(
            "Server did not return a root".to_string(),
        ));
    }
    let raw: RawRootRef = serde_json::from_str(trimmed)?;
    id_from_value(raw.id.as_ref())
        .ok_or_else(|| GenealogyError::NotFound("Root response has no id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_fills_defaults() {
        let node = parse_tree(r#"{"id": "A", "children": null}"#).unwrap();
        assert_eq!(node.id.as_str(), "A");
        assert_eq!(node.username, "");
        assert_eq!(node.full_name, None);
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_accepts_aliases_and_numeric_ids() {
        let node = parse_tree(
            r#"{"_id": 42, "userName": "root", "fullName": "Root User",
                "children": [{"nodeId": 7, "user_name": "kid"}]}"#,
        )
        .unwrap();
        assert_eq!(node.id.as_str(), "42");
        assert_eq!(node.full_name.as_deref(), Some("Root User"));
        assert_eq!(node.children[0].id.as_str(), "7");
        assert_eq!(node.children[0].username, "kid");
    }

    #[test]
    fn test_preserves_child_order() {
        let node = parse_tree(
            r#"{"id": "A", "children": [{"id": "Z"}, {"id": "B"}, {"id": "M"}]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = node.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Z", "B", "M"]);
    }

    #[test]
    fn test_drops_anonymous_and_repeated_children() {
        let node = parse_tree(
            r#"{"id": "A", "children": [
                {"username": "ghost"},
                {"id": "B", "children": [{"id": "A"}]},
                {"id": "B"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(node.children.len(), 1);
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn test_empty_bodies_are_not_found() {
        assert_eq!(parse_tree("").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(parse_tree("null").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(parse_tree("{}").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(parse_tree("{oops").unwrap_err().kind(), ErrorKind::FetchFailed);
    }

    #[test]
    fn test_root_ref() {
        assert_eq!(parse_root_ref(r#"{"id": "R1"}"#).unwrap().as_str(), "R1");
        assert_eq!(parse_root_ref(r#"{"id": 5}"#).unwrap().as_str(), "5");
        assert_eq!(
            parse_root_ref(r#"{"id": ""}"#).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}

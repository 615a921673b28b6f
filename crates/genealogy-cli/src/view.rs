use colored::Colorize;
use genealogy_core::{BreadcrumbEntry, Node, PreferredSource, Source, TreeBackend};
use genealogy_engine::GenealogyNavigator;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MemberRow {
    #[tabled(rename = "#")]
    pub position: String,
    pub id: String,
    pub username: String,
    #[tabled(rename = "name", display_with = "display_name")]
    pub full_name: Option<String>,
    #[tabled(rename = "team", display_with = "display_count")]
    pub team_size: Option<u64>,
}

fn display_name(name: &Option<String>) -> String {
    name.clone().unwrap_or_default()
}

fn display_count(count: &Option<u64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

/// What one screen of the genealogy view shows.
#[derive(Debug, Clone, Serialize)]
pub struct TreeView {
    pub source: Source,
    pub preferred_source: PreferredSource,
    pub breadcrumbs: Vec<BreadcrumbEntry>,
    pub root: MemberRow,
    pub children: Vec<MemberRow>,
    /// Children fetched but beyond the display limit.
    pub hidden_children: usize,
}

fn row<B: TreeBackend + 'static>(
    nav: &GenealogyNavigator<B>,
    position: String,
    node: &Node,
) -> MemberRow {
    MemberRow {
        position,
        id: node.id.to_string(),
        username: node.username.clone(),
        full_name: node.full_name.clone(),
        team_size: nav.team_size(&node.id),
    }
}

pub fn tree_view<B: TreeBackend + 'static>(nav: &GenealogyNavigator<B>) -> Option<TreeView> {
    let state = nav.state();
    let root = state.current_root.as_ref()?;
    let shown = root.displayed_children(nav.config().branching_factor);

    Some(TreeView {
        source: state.active_source,
        preferred_source: state.preferred_source,
        breadcrumbs: state.breadcrumbs.clone(),
        root: row(nav, "root".to_string(), root),
        children: shown
            .iter()
            .enumerate()
            .map(|(i, child)| row(nav, (i + 1).to_string(), child))
            .collect(),
        hidden_children: root.children.len() - shown.len(),
    })
}

pub fn print_view(view: &TreeView) {
    if !view.breadcrumbs.is_empty() {
        let trail: Vec<String> = view
            .breadcrumbs
            .iter()
            .enumerate()
            .map(|(i, crumb)| format!("[{}] {}", i, crumb.username))
            .collect();
        println!("{} {}", "Trail:".cyan().bold(), trail.join(" > "));
    }

    let name = view
        .root
        .full_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&view.root.username);
    println!(
        "{} {} ({}) {} {}",
        "Root:".cyan().bold(),
        name.green().bold(),
        view.root.id,
        "team".cyan(),
        display_count(&view.root.team_size).yellow()
    );
    println!(
        "{} {} (preferred {})",
        "Source:".cyan().bold(),
        view.source.to_string().yellow(),
        view.preferred_source
    );

    if view.children.is_empty() {
        println!("{}", "No downline members".dimmed());
        return;
    }

    let mut table = Table::new(&view.children);
    table.with(Style::rounded());
    println!("{}", table);
    if view.hidden_children > 0 {
        println!("{}", format!("+{} more not shown", view.hidden_children).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_placeholder() {
        assert_eq!(display_count(&Some(12)), "12");
        assert_eq!(display_count(&None), "-");
    }
}

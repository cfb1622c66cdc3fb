use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Menu {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub display_order: i32,
    pub visible: bool,
    pub parent_id: Option<Uuid>,
    pub required_permission: Option<String>,
    pub level: i32,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Menu {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// A menu with no required permission is visible to any authenticated
    /// principal.
    pub fn visible_to(&self, granted: &HashSet<String>) -> bool {
        self.visible
            && self
                .required_permission
                .as_deref()
                .is_none_or(|code| granted.contains(code))
    }
}

/// One node of the assembled menu tree.
#[derive(Debug, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub menu: Menu,
    pub children: Vec<MenuNode>,
}

/// Assemble the tree from a flat scan ordered by display_order. Menus whose
/// parent was filtered out (invisible or not granted) are dropped with it.
pub fn build_tree(menus: Vec<Menu>) -> Vec<MenuNode> {
    fn attach(parent_id: Option<Uuid>, remaining: &mut Vec<Menu>) -> Vec<MenuNode> {
        let (mine, rest): (Vec<Menu>, Vec<Menu>) = std::mem::take(remaining)
            .into_iter()
            .partition(|m| m.parent_id == parent_id);
        *remaining = rest;

        mine.into_iter()
            .map(|menu| {
                let children = attach(Some(menu.id), remaining);
                MenuNode { menu, children }
            })
            .collect()
    }

    let mut remaining = menus;
    attach(None, &mut remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn menu(code: &str, parent_id: Option<Uuid>, required: Option<&str>) -> Menu {
        Menu {
            id: Uuid::now_v7(),
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            url: None,
            icon: None,
            display_order: 0,
            visible: true,
            parent_id,
            required_permission: required.map(str::to_string),
            level: i32::from(parent_id.is_some()),
            audit: AuditFields {
                created_at: Utc::now(),
                updated_at: Utc::now(),
                version: 0,
                active: true,
            },
        }
    }

    #[test]
    fn ungated_menu_is_visible_to_anyone() {
        let m = menu("home", None, None);
        assert!(m.is_root());
        assert!(m.visible_to(&HashSet::new()));
    }

    #[test]
    fn gated_menu_requires_the_exact_code() {
        let m = menu("admin", None, Some("admin:read"));
        assert!(!m.visible_to(&HashSet::new()));

        let granted: HashSet<String> = ["admin:read".to_string()].into();
        assert!(m.visible_to(&granted));
    }

    #[test]
    fn hidden_menu_stays_hidden_even_when_granted() {
        let mut m = menu("secret", None, Some("admin:read"));
        m.visible = false;
        let granted: HashSet<String> = ["admin:read".to_string()].into();
        assert!(!m.visible_to(&granted));
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let root = menu("root", None, None);
        let child_a = menu("a", Some(root.id), None);
        let child_b = menu("b", Some(root.id), None);
        let grandchild = menu("a1", Some(child_a.id), None);

        let tree = build_tree(vec![root, child_a, child_b, grandchild]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].children.len(), 1);
        assert_eq!(tree[0].children[0].children[0].menu.code, "a1");
    }

    #[test]
    fn orphans_of_filtered_parents_are_dropped() {
        let missing_parent = Uuid::now_v7();
        let orphan = menu("orphan", Some(missing_parent), None);
        let tree = build_tree(vec![orphan]);
        assert!(tree.is_empty());
    }
}

//! Department hierarchy over materialized parent paths
//!
//! A root has an empty path; a child's path is its parent's path followed by
//! `:` and the parent id. All functions here are pure.

use std::collections::HashMap;

use crate::entity::department::{self, DepartmentTree};

const PATH_SEPARATOR: char = ':';

/// Path stored on a child created under a department with `parent_path` and
/// id `parent_id`.
pub fn append_child_path(parent_path: &str, parent_id: &str) -> String {
    format!("{}{}{}", parent_path, PATH_SEPARATOR, parent_id)
}

/// Ancestor ids, root first
pub fn ancestor_chain(parent_path: &str) -> Vec<String> {
    parent_path
        .split(PATH_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Assemble the forest from flat records.
///
/// Departments whose parent path matches no node in the forest are dropped.
pub fn build_forest(departments: Vec<department::Model>) -> Vec<DepartmentTree> {
    let mut roots = Vec::new();
    let mut groups: HashMap<String, Vec<DepartmentTree>> = HashMap::new();

    for dep in departments {
        if dep.parent_path.is_empty() {
            roots.push(DepartmentTree::from(dep));
        } else {
            groups
                .entry(dep.parent_path.clone())
                .or_default()
                .push(DepartmentTree::from(dep));
        }
    }

    attach_children(&mut roots, &mut groups);
    roots
}

fn attach_children(nodes: &mut [DepartmentTree], groups: &mut HashMap<String, Vec<DepartmentTree>>) {
    for node in nodes.iter_mut() {
        let path = append_child_path(&node.parent_path, &node.id);
        // Each group is consumed once, so a malformed path cannot recurse forever
        if let Some(mut children) = groups.remove(&path) {
            attach_children(&mut children, groups);
            node.children = children;
        }
    }
}

/// Single-branch tree root -> ... -> `dep`.
///
/// Ancestors missing from `resolved` are skipped; with none resolvable the
/// department itself is returned.
pub fn lineage(
    dep: department::Model,
    resolved: &HashMap<String, department::Model>,
) -> DepartmentTree {
    let chain: Vec<DepartmentTree> = ancestor_chain(&dep.parent_path)
        .iter()
        .filter_map(|id| resolved.get(id))
        .cloned()
        .map(DepartmentTree::from)
        .collect();

    let mut node = DepartmentTree::from(dep);
    for mut ancestor in chain.into_iter().rev() {
        ancestor.children = vec![node];
        node = ancestor;
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(id: &str, parent: Option<&department::Model>) -> department::Model {
        let (parent_id, parent_path) = match parent {
            Some(p) => (Some(p.id.clone()), append_child_path(&p.parent_path, &p.id)),
            None => (None, String::new()),
        };
        department::Model {
            id: id.to_string(),
            name: format!("dep-{}", id),
            parent_id,
            parent_path,
            level: 0,
            leader_id: format!("leader-{}", id),
            create_at: 0,
            update_at: 0,
        }
    }

    fn flatten<'a>(forest: &'a [DepartmentTree], out: &mut Vec<&'a str>) {
        for node in forest {
            out.push(&node.id);
            flatten(&node.children, out);
        }
    }

    #[test]
    fn test_path_round_trip() {
        let path = append_child_path("", "a");
        assert_eq!(path, ":a");
        let path = append_child_path(&path, "b");
        assert_eq!(path, ":a:b");
        assert_eq!(ancestor_chain(&path), vec!["a", "b"]);
        assert!(ancestor_chain("").is_empty());
    }

    #[test]
    fn test_build_forest_nests_children() {
        let a = dep("a", None);
        let b = dep("b", Some(&a));
        let c = dep("c", Some(&b));
        let d = dep("d", Some(&a));
        let e = dep("e", None);

        let forest = build_forest(vec![c.clone(), d.clone(), a.clone(), e.clone(), b.clone()]);
        assert_eq!(forest.len(), 2);

        let root_a = forest.iter().find(|n| n.id == "a").unwrap();
        let mut child_ids: Vec<&str> = root_a.children.iter().map(|n| n.id.as_str()).collect();
        child_ids.sort();
        assert_eq!(child_ids, vec!["b", "d"]);

        let node_b = root_a.children.iter().find(|n| n.id == "b").unwrap();
        assert_eq!(node_b.children.len(), 1);
        assert_eq!(node_b.children[0].id, "c");
    }

    #[test]
    fn test_forest_flatten_round_trip() {
        let a = dep("a", None);
        let b = dep("b", Some(&a));
        let c = dep("c", Some(&b));
        let x = dep("x", None);
        let y = dep("y", Some(&x));

        let forest = build_forest(vec![a, b, c, x, y]);
        let mut ids = Vec::new();
        flatten(&forest, &mut ids);
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "x", "y"]);
    }

    #[test]
    fn test_dangling_branch_is_dropped() {
        let a = dep("a", None);
        let mut orphan = dep("o", None);
        orphan.parent_path = ":missing".to_string();
        orphan.parent_id = Some("missing".to_string());

        let forest = build_forest(vec![a, orphan]);
        let mut ids = Vec::new();
        flatten(&forest, &mut ids);
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_lineage_skips_unresolved_ancestors() {
        let a = dep("a", None);
        let b = dep("b", Some(&a));
        let c = dep("c", Some(&b));

        let mut resolved = HashMap::new();
        resolved.insert(a.id.clone(), a.clone());
        // b is missing
        let tree = lineage(c.clone(), &resolved);
        assert_eq!(tree.id, "a");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].id, "c");

        let alone = lineage(c, &HashMap::new());
        assert_eq!(alone.id, "c");
        assert!(alone.children.is_empty());
    }
}

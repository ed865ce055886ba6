use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::error;
use uuid::Uuid;

use crate::error::{Result, StockroomError};
use crate::model::structural::AdjacencyRow;
use crate::tree::node::TreeNode;

type ChildIndex<'a> = HashMap<Option<Uuid>, Vec<&'a AdjacencyRow>>;

/// Assembles adjacency rows into an owned forest.
///
/// With `root == None` the forest holds every parent-less row; otherwise it
/// holds the children of `root`. Sibling order is the order of `rows`, so the
/// caller passes rows sorted by name. Adjacency data is not trusted: dangling
/// parent references, cycles, duplicate ids and nesting deeper than
/// `max_depth` fail with [StockroomError::MalformedHierarchy].
pub fn build_forest(
    rows: &[AdjacencyRow],
    root: Option<Uuid>,
    max_depth: usize,
) -> Result<Vec<TreeNode>> {
    let known: HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
    if known.len() != rows.len() {
        return Err(malformed("adjacency rows contain duplicate ids".to_string()));
    }

    for row in rows {
        if let Some(parent) = row.parent_id {
            if parent == row.id {
                return Err(malformed(format!("entity {} is its own parent", row.id)));
            }
            if !known.contains(&parent) {
                return Err(malformed(format!(
                    "entity {} references missing parent {}",
                    row.id, parent
                )));
            }
        }
    }

    if let Some(root) = root {
        if !known.contains(&root) {
            return Err(StockroomError::NotFound(format!("parent entity {root}")));
        }
    }

    let index: ChildIndex = rows.iter().map(|r| (r.parent_id, r)).into_group_map();
    let mut visited = HashSet::new();
    if let Some(root) = root {
        visited.insert(root);
    }

    let forest = build_level(&index, root, 1, max_depth, &mut visited)?;

    if root.is_none() && visited.len() != rows.len() {
        return Err(malformed(format!(
            "{} entities are unreachable from any root, their parent chain contains a cycle",
            rows.len() - visited.len()
        )));
    }
    Ok(forest)
}

fn build_level(
    index: &ChildIndex,
    parent: Option<Uuid>,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<Uuid>,
) -> Result<Vec<TreeNode>> {
    let Some(rows) = index.get(&parent) else {
        return Ok(vec![]);
    };
    if depth > max_depth {
        return Err(malformed(format!(
            "hierarchy exceeds the maximum depth of {max_depth}"
        )));
    }

    let mut nodes = Vec::with_capacity(rows.len());
    for row in rows {
        if !visited.insert(row.id) {
            return Err(malformed(format!("cycle detected at entity {}", row.id)));
        }
        let children = build_level(index, Some(row.id), depth + 1, max_depth, visited)?;
        nodes.push(TreeNode::new(row.id, row.name.clone()).with_children(children));
    }
    Ok(nodes)
}

fn malformed(msg: String) -> StockroomError {
    error!("Refusing to build tree: {msg}");
    StockroomError::MalformedHierarchy(msg)
}

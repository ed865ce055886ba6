use serde::{Deserialize, Serialize};

use crate::model::structural::EntityClass;

/// Seeds a structural hierarchy. Nodes are matched by name under their
/// parent, so applying the same declaration twice is a no-op.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct StructureDeclaration {
    pub class: EntityClass,
    pub nodes: Vec<NodeDeclaration>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct NodeDeclaration {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub children: Vec<NodeDeclaration>,
}

impl NodeDeclaration {
    /// Number of nodes declared in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeDeclaration::count).sum::<usize>()
    }

    /// Depth of this subtree, a single node has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(NodeDeclaration::depth).max().unwrap_or(0)
    }
}

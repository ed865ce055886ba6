use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generic node of a structural hierarchy. Children are owned by their parent
/// and kept in the order the source returned them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: Uuid,
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "nodes", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub selected: bool,
}

impl TreeNode {
    pub fn new(id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            children: vec![],
            href: None,
            tags: vec![],
            selected: false,
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this node.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Depth-first pre-order search by id.
    pub fn find(&self, id: Uuid) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, StockroomError};
use crate::model::structural::{AdjacencyRow, EntityClass};
use crate::tree::builder::build_forest;
use crate::tree::node::TreeNode;

/// Source of parent/child adjacency for structural entity classes.
///
/// Implementors only have to provide [AdjacencyRepository::adjacency_rows];
/// the forest shaped lookups default to the guarded in-memory builder and may
/// be overridden by stores that can answer them natively.
#[async_trait]
pub trait AdjacencyRepository: Send {
    /// All rows of a structural class, sorted by name ascending.
    async fn adjacency_rows(&mut self, class: EntityClass) -> Result<Vec<AdjacencyRow>>;

    /// The full forest of `class`, rooted at its parent-less entities.
    async fn root_nodes(&mut self, class: EntityClass, max_depth: usize) -> Result<Vec<TreeNode>> {
        let rows = self.adjacency_rows(class).await?;
        build_forest(&rows, None, max_depth)
    }

    /// The children of `parent_id` and everything below them.
    async fn subtree(
        &mut self,
        class: EntityClass,
        parent_id: Uuid,
        max_depth: usize,
    ) -> Result<Vec<TreeNode>> {
        let rows = self.adjacency_rows(class).await?;
        build_forest(&rows, Some(parent_id), max_depth)
    }
}

/// Holds adjacency rows in memory, for embedding without a database and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAdjacencyRepository {
    rows: HashMap<EntityClass, Vec<AdjacencyRow>>,
    reads: usize,
}

impl MemoryAdjacencyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: EntityClass, row: AdjacencyRow) -> Result<()> {
        if !class.is_structural() {
            return Err(StockroomError::Configuration(format!(
                "entity class '{class}' has no hierarchy"
            )));
        }
        self.rows.entry(class).or_default().push(row);
        Ok(())
    }

    pub fn with(mut self, class: EntityClass, id: Uuid, name: &str, parent_id: Option<Uuid>) -> Self {
        self.rows
            .entry(class)
            .or_default()
            .push(AdjacencyRow::new(id, name, parent_id));
        self
    }

    /// Number of adjacency reads served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl AdjacencyRepository for MemoryAdjacencyRepository {
    async fn adjacency_rows(&mut self, class: EntityClass) -> Result<Vec<AdjacencyRow>> {
        self.reads += 1;
        let mut rows = self.rows.get(&class).cloned().unwrap_or_default();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}

use crate::error::{Result, StockroomError};
use crate::model::structural::{AdjacencyRow, EntityClass, NewStructuralEntity, StructuralEntity};
use crate::tree::repository::AdjacencyRepository;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Nullable, Text, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::PgDb;

// Table names come from the static EntityClass table, never from user input.
fn table_for(class: EntityClass) -> Result<&'static str> {
    class.structural_table().ok_or_else(|| {
        StockroomError::Configuration(format!("entity class '{class}' has no hierarchy"))
    })
}

impl<'a> PgDb<'a> {
    /// Every row of a structural class, ordered by name.
    pub async fn get_adjacency_rows(&mut self, class: EntityClass) -> Result<Vec<AdjacencyRow>> {
        let table = table_for(class)?;
        Ok(sql_query(format!(
            r#"SELECT id, name, parent_id FROM "{table}" ORDER BY name ASC, id ASC"#
        ))
        .load(&mut self.con)
        .await?)
    }

    pub async fn create_structural_entity(
        &mut self,
        class: EntityClass,
        val: &NewStructuralEntity,
    ) -> Result<StructuralEntity> {
        let table = table_for(class)?;
        if let Some(parent) = val.parent_id {
            self.get_structural_entity(class, &parent).await?;
        }
        Ok(sql_query(format!(
            r#"INSERT INTO "{table}" (name, parent_id, comment) VALUES ($1, $2, $3)
               RETURNING id, name, parent_id, comment"#
        ))
        .bind::<Text, _>(&val.name)
        .bind::<Nullable<SqlUuid>, _>(val.parent_id)
        .bind::<Text, _>(&val.comment)
        .get_result(&mut self.con)
        .await?)
    }

    pub async fn get_structural_entity(
        &mut self,
        class: EntityClass,
        id_val: &Uuid,
    ) -> Result<StructuralEntity> {
        let table = table_for(class)?;
        sql_query(format!(
            r#"SELECT id, name, parent_id, comment FROM "{table}" WHERE id = $1"#
        ))
        .bind::<SqlUuid, _>(id_val)
        .get_result(&mut self.con)
        .await
        .optional()?
        .ok_or_else(|| StockroomError::NotFound(format!("{class} {id_val} does not exist")))
    }

    /// Looks up an entity by name among the children of `parent_id`, or among
    /// the roots when `parent_id` is `None`.
    pub async fn find_structural_child(
        &mut self,
        class: EntityClass,
        parent_id: Option<Uuid>,
        name_val: &str,
    ) -> Result<Option<StructuralEntity>> {
        let table = table_for(class)?;
        Ok(sql_query(format!(
            r#"SELECT id, name, parent_id, comment FROM "{table}"
               WHERE name = $1 AND parent_id IS NOT DISTINCT FROM $2
               ORDER BY id ASC LIMIT 1"#
        ))
        .bind::<Text, _>(name_val)
        .bind::<Nullable<SqlUuid>, _>(parent_id)
        .get_result(&mut self.con)
        .await
        .optional()?)
    }
}

#[async_trait]
impl<'a> AdjacencyRepository for PgDb<'a> {
    async fn adjacency_rows(&mut self, class: EntityClass) -> Result<Vec<AdjacencyRow>> {
        self.get_adjacency_rows(class).await
    }
}

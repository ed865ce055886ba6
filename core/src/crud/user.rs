use crate::error::{Result, StockroomError};
use crate::model::permission::PermissionData;
use crate::model::user::{group_chain, Actor, Group, NewGroup, NewUser, User};

use crate::schema;
use diesel::{insert_into, prelude::*, update};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::PgDb;

impl<'a> PgDb<'a> {
    /// Creates or updates a user. Updating always bumps the permission
    /// version, which rotates the user's tree cache key.
    pub async fn upsert_user(&mut self, val: &NewUser) -> Result<User> {
        use schema::users::dsl::*;
        insert_into(users)
            .values(val)
            .on_conflict(name)
            .do_update()
            .set((val, permissions_version.eq(permissions_version + 1)))
            .execute(&mut self.con)
            .await?;

        self.get_user_by_name(&val.name).await
    }

    pub async fn get_user_by_name(&mut self, name_val: &str) -> Result<User> {
        use schema::users::dsl::*;
        Ok(users
            .filter(name.eq(name_val))
            .select(User::as_select())
            .get_result(&mut self.con)
            .await?)
    }

    /// Replaces the explicit permissions of a user and bumps its permission
    /// version in the same statement.
    pub async fn set_user_permissions(
        &mut self,
        user_id: &Uuid,
        permissions_val: &PermissionData,
    ) -> Result<User> {
        use schema::users::dsl::*;
        Ok(update(users.filter(id.eq(user_id)))
            .set((
                permissions.eq(permissions_val),
                permissions_version.eq(permissions_version + 1),
            ))
            .returning(User::as_returning())
            .get_result(&mut self.con)
            .await?)
    }

    pub async fn upsert_group(&mut self, val: &NewGroup) -> Result<Group> {
        use schema::groups::dsl::*;
        insert_into(groups)
            .values(val)
            .on_conflict(name)
            .do_update()
            .set(val)
            .execute(&mut self.con)
            .await?;

        self.get_group_by_name(&val.name).await
    }

    pub async fn get_group_by_name(&mut self, name_val: &str) -> Result<Group> {
        use schema::groups::dsl::*;
        Ok(groups
            .filter(name.eq(name_val))
            .select(Group::as_select())
            .get_result(&mut self.con)
            .await?)
    }

    pub async fn get_all_groups(&mut self) -> Result<Vec<Group>> {
        use schema::groups::dsl::*;
        Ok(groups
            .order(name.asc())
            .select(Group::as_select())
            .load(&mut self.con)
            .await?)
    }

    /// The groups of `start` and all of its ancestors, nearest first.
    pub async fn get_group_chain(
        &mut self,
        start: Option<Uuid>,
        max_depth: usize,
    ) -> Result<Vec<Group>> {
        if start.is_none() {
            return Ok(vec![]);
        }
        let all = self.get_all_groups().await?;
        group_chain(&all, start, max_depth)
    }

    /// Loads everything needed to resolve permissions for the user `name_val`.
    pub async fn load_actor(&mut self, name_val: &str, max_depth: usize) -> Result<Actor> {
        let user = self.get_user_by_name(name_val).await.map_err(|e| match e {
            StockroomError::NotFound(_) => {
                StockroomError::NotFound(format!("user '{name_val}' does not exist"))
            }
            e => e,
        })?;
        let groups = self.get_group_chain(user.group_id, max_depth).await?;
        Ok(Actor::new(user, groups))
    }
}

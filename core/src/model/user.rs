use std::collections::{HashMap, HashSet};

use crate::error::{Result, StockroomError};
use crate::model::permission::PermissionData;
use crate::schema::{groups, users};

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user is any authenticated actor of the inventory. Authentication happens
/// upstream; this crate only needs the user's own [PermissionData] and group
/// membership to resolve permissions.
#[derive(Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub group_id: Option<Uuid>,
    /// Explicit grants of this user. Everything else inherits from the group chain.
    pub permissions: PermissionData,
    /// Bumped on every permission change, rotating the user's tree cache key.
    pub permissions_version: i32,
}

/// Used to create or update a [User] object in the database.
#[derive(
    Clone, Serialize, Deserialize, Insertable, Queryable, Selectable, Debug, PartialEq, AsChangeset,
)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub group_id: Option<Uuid>,
    pub permissions: PermissionData,
}

/// Groups bundle permissions for many users. Groups form a hierarchy
/// (structural self reference); a group inherits undecided permissions from its
/// parent group.
#[derive(Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Debug, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub comment: String,
    pub permissions: PermissionData,
}

/// Used to create or update a [Group] object in the database.
#[derive(
    Clone, Serialize, Deserialize, Insertable, Queryable, Selectable, Debug, PartialEq, AsChangeset,
)]
#[diesel(table_name = groups)]
pub struct NewGroup {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub comment: String,
    pub permissions: PermissionData,
}

/// An authenticated user together with its group chain, nearest group first.
/// This is everything the resolver reads; it is loaded once per request and is
/// read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub user: User,
    pub groups: Vec<Group>,
}

/// Who decided a permission, see [Actor::holders].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Holder<'a> {
    User(&'a User),
    Group(&'a Group),
}

impl<'a> Holder<'a> {
    pub fn permissions(&self) -> &'a PermissionData {
        match self {
            Holder::User(u) => &u.permissions,
            Holder::Group(g) => &g.permissions,
        }
    }
}

impl Actor {
    pub fn new(user: User, groups: Vec<Group>) -> Self {
        Self { user, groups }
    }

    /// The user followed by its groups, in the order they are consulted.
    pub fn holders(&self) -> impl Iterator<Item = Holder<'_>> + Clone {
        std::iter::once(Holder::User(&self.user)).chain(self.groups.iter().map(Holder::Group))
    }

    pub fn primary_group(&self) -> Option<&Group> {
        self.groups.first()
    }
}

/// Orders the groups reachable from `start` by following parent links, nearest
/// group first. A dangling parent, a cycle or a chain longer than `max_depth`
/// is a [StockroomError::MalformedHierarchy].
pub fn group_chain(groups: &[Group], start: Option<Uuid>, max_depth: usize) -> Result<Vec<Group>> {
    let by_id: HashMap<Uuid, &Group> = groups.iter().map(|g| (g.id, g)).collect();
    let mut visited = HashSet::new();
    let mut chain = vec![];
    let mut next = start;
    while let Some(id) = next {
        if !visited.insert(id) {
            return Err(StockroomError::MalformedHierarchy(format!(
                "group {id} is its own ancestor"
            )));
        }
        if chain.len() >= max_depth {
            return Err(StockroomError::MalformedHierarchy(format!(
                "group chain exceeds the maximum depth of {max_depth}"
            )));
        }
        let group = by_id.get(&id).ok_or_else(|| {
            StockroomError::MalformedHierarchy(format!("group {id} does not exist"))
        })?;
        chain.push((*group).clone());
        next = group.parent_id;
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, parent_id: Option<Uuid>) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id,
            comment: String::new(),
            permissions: PermissionData::new(),
        }
    }

    #[test]
    fn chain_is_nearest_first() -> Result<()> {
        let root = group("everyone", None);
        let mid = group("staff", Some(root.id));
        let leaf = group("editors", Some(mid.id));
        let unrelated = group("guests", None);
        let all = vec![unrelated, root.clone(), leaf.clone(), mid.clone()];

        let chain = group_chain(&all, Some(leaf.id), 8)?;
        let names: Vec<_> = chain.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["editors", "staff", "everyone"]);
        assert!(group_chain(&all, None, 8)?.is_empty());
        assert!(group_chain(&all, Some(leaf.id), 2).is_err());
        Ok(())
    }

    #[test]
    fn cyclic_and_dangling_chains_are_malformed() {
        let mut a = group("a", None);
        let b = group("b", Some(a.id));
        a.parent_id = Some(b.id);
        let err = group_chain(&[a.clone(), b], Some(a.id), 8).expect_err("cycle");
        assert!(err.to_string().contains("its own ancestor"));

        let orphan = group("orphan", Some(Uuid::new_v4()));
        let err = group_chain(&[orphan.clone()], Some(orphan.id), 8).expect_err("dangling");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn holders_start_with_the_user() {
        let g = group("staff", None);
        let user = User {
            id: Uuid::new_v4(),
            name: "dave".into(),
            group_id: Some(g.id),
            permissions: PermissionData::new(),
            permissions_version: 0,
        };
        let actor = Actor::new(user, vec![g.clone()]);
        let holders: Vec<_> = actor.holders().collect();
        assert!(matches!(holders[0], Holder::User(u) if u.name == "dave"));
        assert!(matches!(holders[1], Holder::Group(x) if x.id == g.id));
        assert_eq!(actor.primary_group(), Some(&g));
    }
}

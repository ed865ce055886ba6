use std::fmt;
use std::str::FromStr;

use diesel::sql_types::{Nullable, Text, Uuid as SqlUuid};
use diesel::QueryableByName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockroomError;

/// Every entity type that can be the subject of an authorization decision.
/// This enum is the static association of entity type to permission namespace,
/// backing table and hierarchy support.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Part,
    Category,
    StorageLocation,
    Footprint,
    Manufacturer,
    Supplier,
    Project,
    User,
    Group,
}

impl EntityClass {
    pub const ALL: [EntityClass; 9] = [
        EntityClass::Part,
        EntityClass::Category,
        EntityClass::StorageLocation,
        EntityClass::Footprint,
        EntityClass::Manufacturer,
        EntityClass::Supplier,
        EntityClass::Project,
        EntityClass::User,
        EntityClass::Group,
    ];

    /// Stable lower case name, used in cache keys, tags and URLs.
    pub fn name(&self) -> &'static str {
        match self {
            EntityClass::Part => "part",
            EntityClass::Category => "category",
            EntityClass::StorageLocation => "storage_location",
            EntityClass::Footprint => "footprint",
            EntityClass::Manufacturer => "manufacturer",
            EntityClass::Supplier => "supplier",
            EntityClass::Project => "project",
            EntityClass::User => "user",
            EntityClass::Group => "group",
        }
    }

    /// Root permission set for this entity type. Sub-permissions live under
    /// `<namespace>_<base>`.
    pub fn namespace(&self) -> &'static str {
        match self {
            EntityClass::Part => "parts",
            EntityClass::Category => "categories",
            EntityClass::StorageLocation => "storelocations",
            EntityClass::Footprint => "footprints",
            EntityClass::Manufacturer => "manufacturers",
            EntityClass::Supplier => "suppliers",
            EntityClass::Project => "projects",
            EntityClass::User => "users",
            EntityClass::Group => "groups",
        }
    }

    /// Self-referential table backing a structural class, `None` for classes
    /// without a parent/children hierarchy.
    pub fn structural_table(&self) -> Option<&'static str> {
        match self {
            EntityClass::Category => Some("categories"),
            EntityClass::StorageLocation => Some("storage_locations"),
            EntityClass::Footprint => Some("footprints"),
            EntityClass::Manufacturer => Some("manufacturers"),
            EntityClass::Supplier => Some("suppliers"),
            EntityClass::Project => Some("projects"),
            EntityClass::Group => Some("groups"),
            EntityClass::Part | EntityClass::User => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.structural_table().is_some()
    }

    /// Cache tag shared by every cached tree of this class.
    pub fn tree_tag(&self) -> String {
        format!("tree_{}", self.name())
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityClass {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityClass::ALL
            .iter()
            .find(|class| class.name() == s)
            .copied()
            .ok_or_else(|| StockroomError::InvalidRequest(format!("unknown entity class '{s}'")))
    }
}

/// Anything a voter can decide on. Implementors report their class; the
/// namespace follows statically from it.
pub trait AuthorizationSubject {
    fn entity_class(&self) -> EntityClass;

    fn entity_id(&self) -> Option<Uuid> {
        None
    }
}

/// Class level checks ("may this user create categories at all").
impl AuthorizationSubject for EntityClass {
    fn entity_class(&self) -> EntityClass {
        *self
    }
}

/// A reference to a concrete entity by class and id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub class: EntityClass,
    pub id: Uuid,
}

impl AuthorizationSubject for SubjectRef {
    fn entity_class(&self) -> EntityClass {
        self.class
    }

    fn entity_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// One row of a structural table: the adjacency information the tree builder
/// consumes.
#[derive(Serialize, Deserialize, QueryableByName, Debug, Clone, PartialEq)]
pub struct AdjacencyRow {
    #[diesel(sql_type = SqlUuid)]
    pub id: Uuid,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Nullable<SqlUuid>)]
    pub parent_id: Option<Uuid>,
}

impl AdjacencyRow {
    pub fn new(id: Uuid, name: &str, parent_id: Option<Uuid>) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent_id,
        }
    }
}

/// A stored structural entity of any structural class.
#[derive(Serialize, Deserialize, QueryableByName, Debug, Clone, PartialEq)]
pub struct StructuralEntity {
    #[diesel(sql_type = SqlUuid)]
    pub id: Uuid,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Nullable<SqlUuid>)]
    pub parent_id: Option<Uuid>,
    #[diesel(sql_type = Text)]
    pub comment: String,
}

/// Used when creating a new [StructuralEntity].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewStructuralEntity {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for class in EntityClass::ALL {
            assert_eq!(class.name().parse::<EntityClass>().ok(), Some(class));
        }
        assert!("widgets".parse::<EntityClass>().is_err());
    }

    #[test]
    fn parts_and_users_are_not_structural() {
        assert!(!EntityClass::Part.is_structural());
        assert!(!EntityClass::User.is_structural());
        assert!(EntityClass::Category.is_structural());
        assert_eq!(EntityClass::Category.tree_tag(), "tree_category");
        assert_eq!(EntityClass::StorageLocation.namespace(), "storelocations");
    }
}

use serde::{Deserialize, Serialize};

use crate::model::permission::PermissionData;

/// Declares a user, its group membership and its own permission overrides.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct UserDeclaration {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub permissions: PermissionData,
}

/// Declares a group. `parent` names another group, which must either exist
/// already or be declared in the same batch.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct GroupDeclaration {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub permissions: PermissionData,
}

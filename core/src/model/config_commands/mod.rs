use serde::{Deserialize, Serialize};

use self::{
    structure::StructureDeclaration,
    user::{GroupDeclaration, UserDeclaration},
};

use crate::error::{Result, StockroomError};
use crate::model::permission::PermissionCatalogue;
use crate::model::structural::EntityClass;

pub mod structure;
pub mod user;

/// Describes a desired state for a declared [ConfigObject].
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct ConfigCommand {
    pub api_version: String,
    pub config_object: ConfigObject,
}

/// These are declarative, non relational representations of the objects that
/// carry permissions and hierarchies. Admins maintain these definitions and
/// `stockctl` translates them to rows, updating the database to be in line
/// with the declared state.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(tag = "kind", content = "spec")]
pub enum ConfigObject {
    Group(GroupDeclaration),
    User(UserDeclaration),
    Structure(StructureDeclaration),
}

impl ConfigObject {
    /// Groups must exist before users reference them.
    pub fn apply_precedence(&self) -> u8 {
        match self {
            ConfigObject::Group(_) => 0,
            ConfigObject::User(_) => 1,
            ConfigObject::Structure(_) => 2,
        }
    }

    /// Checks the declaration against the permission catalogue and the
    /// structural class table before anything is written.
    pub fn validate(&self, catalogue: &PermissionCatalogue, max_depth: usize) -> Result<()> {
        match self {
            ConfigObject::Group(group) => catalogue.validate_permission_data(&group.permissions),
            ConfigObject::User(user) => catalogue.validate_permission_data(&user.permissions),
            ConfigObject::Structure(structure) => {
                if !structure.class.is_structural() || structure.class == EntityClass::Group {
                    return Err(StockroomError::InvalidRequest(format!(
                        "entity class '{}' cannot be seeded as a structure",
                        structure.class
                    )));
                }
                match structure.nodes.iter().map(|n| n.depth()).max() {
                    Some(depth) if depth > max_depth => Err(StockroomError::InvalidRequest(format!(
                        "declared {} hierarchy is {depth} levels deep, the maximum is {max_depth}",
                        structure.class
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::permission::PermissionValue;

    #[test]
    fn parses_group_command() -> Result<()> {
        let yaml = r#"
api_version: v1
config_object:
  kind: Group
  spec:
    name: editors
    parent: readers
    permissions:
      parts:
        edit: allow
      parts_name:
        edit: deny
"#;
        let cmd: ConfigCommand = serde_yaml::from_str(yaml)?;
        let ConfigObject::Group(group) = &cmd.config_object else {
            panic!("expected a group declaration");
        };
        assert_eq!(group.parent.as_deref(), Some("readers"));
        assert_eq!(group.permissions.get("parts", "edit"), PermissionValue::Allow);
        assert_eq!(group.permissions.get("parts_name", "edit"), PermissionValue::Deny);
        cmd.config_object
            .validate(&PermissionCatalogue::bundled()?, 8)?;
        Ok(())
    }

    #[test]
    fn validates_structures() -> Result<()> {
        let yaml = r#"
api_version: v1
config_object:
  kind: Structure
  spec:
    class: storage_location
    nodes:
      - name: Shelf 1
        children:
          - name: Box A
            children:
              - name: Drawer 3
"#;
        let cmd: ConfigCommand = serde_yaml::from_str(yaml)?;
        let catalogue = PermissionCatalogue::bundled()?;
        cmd.config_object.validate(&catalogue, 3)?;
        assert!(cmd.config_object.validate(&catalogue, 2).is_err());
        assert_eq!(cmd.config_object.apply_precedence(), 2);

        let parts: ConfigCommand = serde_yaml::from_str(
            "api_version: v1\nconfig_object:\n  kind: Structure\n  spec:\n    class: part\n    nodes: []\n",
        )?;
        assert!(parts.config_object.validate(&catalogue, 3).is_err());
        Ok(())
    }

    #[test]
    fn rejects_unknown_permissions() -> Result<()> {
        let yaml = r#"
api_version: v1
config_object:
  kind: User
  spec:
    name: eve
    permissions:
      parts:
        teleport: allow
"#;
        let cmd: ConfigCommand = serde_yaml::from_str(yaml)?;
        assert!(cmd
            .config_object
            .validate(&PermissionCatalogue::bundled()?, 8)
            .is_err());
        Ok(())
    }
}

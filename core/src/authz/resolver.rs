use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::model::permission::{PermissionCatalogue, PermissionData};
use crate::model::user::{Actor, Holder};

/// Where a [Resolution] came from.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The user's own permission data decided.
    User,
    /// A group in the user's group chain decided.
    Group(String),
    /// No holder decided anywhere along the permission set chain.
    Default,
    /// The permission set or operation is not in the catalogue, or a parent set
    /// the walk reached does not declare the operation. Always denies.
    Undeclared,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub allowed: bool,
    /// Permission set that carried the decision, the parent lacking the
    /// operation for an undeclared inheritance, or the requested one otherwise.
    pub permission: String,
    pub source: ResolutionSource,
}

/// Resolves effective permissions against a [PermissionCatalogue].
///
/// For each permission set along the requested set's parent chain, most
/// specific first, the holders are consulted in order (user, then groups from
/// nearest to furthest); the first explicit allow or deny wins. When nothing
/// decides, the configured default applies. Unknown sets, operations a set
/// does not declare, and inheritance into a parent set lacking the operation
/// are denied regardless of the default.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    catalogue: Arc<PermissionCatalogue>,
    default_allow: bool,
}

impl PermissionResolver {
    pub fn new(catalogue: Arc<PermissionCatalogue>, default_allow: bool) -> Self {
        Self {
            catalogue,
            default_allow,
        }
    }

    pub fn catalogue(&self) -> &PermissionCatalogue {
        &self.catalogue
    }

    pub fn default_allow(&self) -> bool {
        self.default_allow
    }

    pub fn recognizes(&self, permission: &str, operation: &str) -> bool {
        self.catalogue.recognizes(permission, operation)
    }

    pub fn resolve(&self, actor: &Actor, permission: &str, operation: &str) -> bool {
        self.explain(actor, permission, operation).allowed
    }

    /// Resolves against a single holder's data, without any group chain.
    pub fn resolve_data(&self, data: &PermissionData, permission: &str, operation: &str) -> bool {
        self.explain_holders(
            std::iter::once((ResolutionSource::User, data)),
            permission,
            operation,
        )
        .allowed
    }

    pub fn explain(&self, actor: &Actor, permission: &str, operation: &str) -> Resolution {
        let holders = actor.holders().map(|holder| match holder {
            Holder::User(u) => (ResolutionSource::User, &u.permissions),
            Holder::Group(g) => (ResolutionSource::Group(g.name.clone()), &g.permissions),
        });
        let resolution = self.explain_holders(holders, permission, operation);
        debug!(
            "Resolved {permission}.{operation} for user {} to {} via {:?}",
            actor.user.name, resolution.allowed, resolution.source
        );
        resolution
    }

    fn explain_holders<'a, I>(&self, holders: I, permission: &str, operation: &str) -> Resolution
    where
        I: Iterator<Item = (ResolutionSource, &'a PermissionData)> + Clone,
    {
        if !self.catalogue.recognizes(permission, operation) {
            return Resolution {
                allowed: false,
                permission: permission.to_string(),
                source: ResolutionSource::Undeclared,
            };
        }

        for set in self.catalogue.parent_chain(permission) {
            // inheriting from a parent that does not declare the operation denies
            if !set.has_operation(operation) {
                return Resolution {
                    allowed: false,
                    permission: set.name.clone(),
                    source: ResolutionSource::Undeclared,
                };
            }
            for (source, data) in holders.clone() {
                if let Some(allowed) = data.get(&set.name, operation).decision() {
                    return Resolution {
                        allowed,
                        permission: set.name.clone(),
                        source,
                    };
                }
            }
        }

        Resolution {
            allowed: self.default_allow,
            permission: permission.to_string(),
            source: ResolutionSource::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::error::Result;
    use crate::model::permission::{PermissionSet, PermissionValue};
    use crate::model::user::{Group, User};

    fn catalogue() -> Arc<PermissionCatalogue> {
        let sets = vec![
            PermissionSet {
                name: "parts".into(),
                label: None,
                parent: None,
                operations: vec!["read".into(), "edit".into(), "delete".into()],
            },
            PermissionSet {
                name: "parts_name".into(),
                label: None,
                parent: Some("parts".into()),
                operations: vec!["read".into(), "edit".into()],
            },
            PermissionSet {
                name: "parts_name_suffix".into(),
                label: None,
                parent: Some("parts_name".into()),
                operations: vec!["edit".into(), "rename".into()],
            },
        ];
        Arc::new(PermissionCatalogue::try_new(sets).unwrap())
    }

    fn user(permissions: PermissionData) -> User {
        User {
            id: Uuid::new_v4(),
            name: "alice".into(),
            group_id: None,
            permissions,
            permissions_version: 0,
        }
    }

    fn group(name: &str, permissions: PermissionData) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: None,
            comment: String::new(),
            permissions,
        }
    }

    #[test]
    fn inherit_falls_back_to_parent_set() {
        let resolver = PermissionResolver::new(catalogue(), false);
        let data = PermissionData::new()
            .with("parts", "edit", PermissionValue::Allow)
            .with("parts_name", "edit", PermissionValue::Inherit);
        let actor = Actor::new(user(data), vec![]);

        assert!(resolver.resolve(&actor, "parts_name", "edit"));
        assert_eq!(
            resolver.explain(&actor, "parts_name", "edit"),
            Resolution {
                allowed: true,
                permission: "parts".into(),
                source: ResolutionSource::User,
            }
        );
    }

    #[test]
    fn explicit_values_ignore_parent_chain() {
        let resolver = PermissionResolver::new(catalogue(), false);
        let allow = PermissionData::new()
            .with("parts", "edit", PermissionValue::Deny)
            .with("parts_name", "edit", PermissionValue::Allow);
        assert!(resolver.resolve_data(&allow, "parts_name", "edit"));

        let deny = PermissionData::new()
            .with("parts", "edit", PermissionValue::Allow)
            .with("parts_name", "edit", PermissionValue::Deny);
        assert!(!resolver.resolve_data(&deny, "parts_name", "edit"));
    }

    #[test]
    fn inherit_equals_parent_resolution_for_every_operation() {
        let resolver = PermissionResolver::new(catalogue(), false);
        let values = [
            PermissionValue::Allow,
            PermissionValue::Deny,
            PermissionValue::Inherit,
        ];
        for parent_value in values {
            let data = PermissionData::new().with("parts", "read", parent_value);
            assert_eq!(
                resolver.resolve_data(&data, "parts_name", "read"),
                resolver.resolve_data(&data, "parts", "read"),
            );
        }
    }

    #[test]
    fn unresolved_uses_configured_default() {
        let empty = PermissionData::new();
        assert!(!PermissionResolver::new(catalogue(), false).resolve_data(&empty, "parts_name", "edit"));
        assert!(PermissionResolver::new(catalogue(), true).resolve_data(&empty, "parts_name", "edit"));
    }

    #[test]
    fn undeclared_pairs_fail_closed() {
        let resolver = PermissionResolver::new(catalogue(), true);
        let data = PermissionData::new().with("parts", "delete", PermissionValue::Allow);
        // parts_name does not declare delete
        assert!(!resolver.resolve_data(&data, "parts_name", "delete"));
        assert!(!resolver.resolve_data(&data, "unknown", "read"));

        let actor = Actor::new(user(data), vec![]);
        assert_eq!(
            resolver.explain(&actor, "parts_name", "delete").source,
            ResolutionSource::Undeclared
        );
    }

    #[test]
    fn chain_stops_at_parent_without_operation() {
        let resolver = PermissionResolver::new(catalogue(), true);
        let data = PermissionData::new().with("parts", "edit", PermissionValue::Deny);
        // rename is only declared on the leaf, inheriting it from parts_name denies
        assert!(!resolver.resolve_data(&data, "parts_name_suffix", "rename"));
        assert_eq!(
            resolver.explain(&Actor::new(user(PermissionData::new()), vec![]), "parts_name_suffix", "rename"),
            Resolution {
                allowed: false,
                permission: "parts_name".into(),
                source: ResolutionSource::Undeclared,
            }
        );
        let empty = PermissionData::new();
        assert_eq!(
            resolver.resolve_data(&empty, "parts_name_suffix", "rename"),
            resolver.resolve_data(&empty, "parts_name", "rename")
        );
        // an explicit grant on the leaf still decides before the walk reaches the parent
        let leaf = PermissionData::new().with("parts_name_suffix", "rename", PermissionValue::Allow);
        assert!(resolver.resolve_data(&leaf, "parts_name_suffix", "rename"));
        // edit walks the full chain up to parts
        assert!(!resolver.resolve_data(&data, "parts_name_suffix", "edit"));
        // the default applies only once the whole chain declares the operation
        assert!(resolver.resolve_data(&PermissionData::new(), "parts_name_suffix", "edit"));
    }

    #[test]
    fn groups_decide_after_user() -> Result<()> {
        let resolver = PermissionResolver::new(catalogue(), false);
        let editors = group(
            "editors",
            PermissionData::new().with("parts", "edit", PermissionValue::Allow),
        );
        let everyone = group(
            "everyone",
            PermissionData::new()
                .with("parts", "edit", PermissionValue::Deny)
                .with("parts", "read", PermissionValue::Allow),
        );

        let actor = Actor::new(user(PermissionData::new()), vec![editors, everyone]);
        assert!(resolver.resolve(&actor, "parts", "edit"));
        assert!(resolver.resolve(&actor, "parts_name", "read"));
        assert_eq!(
            resolver.explain(&actor, "parts", "read").source,
            ResolutionSource::Group("everyone".into())
        );

        let mut restricted = actor.clone();
        restricted
            .user
            .permissions
            .set("parts", "edit", PermissionValue::Deny);
        assert!(!resolver.resolve(&restricted, "parts", "edit"));
        Ok(())
    }

    #[test]
    fn specific_group_value_beats_general_user_value() {
        let resolver = PermissionResolver::new(catalogue(), false);
        let group = group(
            "readonly",
            PermissionData::new().with("parts_name", "edit", PermissionValue::Deny),
        );
        let actor = Actor::new(
            user(PermissionData::new().with("parts", "edit", PermissionValue::Allow)),
            vec![group],
        );
        assert!(!resolver.resolve(&actor, "parts_name", "edit"));
    }
}

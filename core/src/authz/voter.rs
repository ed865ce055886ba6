use std::sync::Arc;

use tracing::{debug, info};

use crate::authz::attribute::Attribute;
use crate::authz::resolver::PermissionResolver;
use crate::error::{Result, StockroomError};
use crate::model::structural::{AuthorizationSubject, EntityClass};
use crate::model::user::Actor;

/// Decides attributes for one [EntityClass]. All voters share the same
/// dispatch and attribute parsing; they differ only in the class they accept
/// and the namespace they resolve under.
#[derive(Debug, Clone)]
pub struct EntityVoter {
    class: EntityClass,
    namespace: &'static str,
    resolver: Arc<PermissionResolver>,
}

impl EntityVoter {
    /// Creates the voter for `class`. Fails if the catalogue has no permission
    /// set for the class namespace.
    pub fn try_new(class: EntityClass, resolver: Arc<PermissionResolver>) -> Result<Self> {
        let namespace = class.namespace();
        if !resolver.catalogue().contains(namespace) {
            return Err(StockroomError::Configuration(format!(
                "entity class '{class}' maps to namespace '{namespace}' which the permission catalogue does not declare"
            )));
        }
        Ok(Self {
            class,
            namespace,
            resolver,
        })
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// True if `subject` is of this voter's class and `attribute` names a
    /// declared operation of a permission set in this voter's namespace.
    pub fn supports(&self, attribute: &str, subject: &dyn AuthorizationSubject) -> bool {
        if subject.entity_class() != self.class {
            return false;
        }
        match Attribute::parse(attribute) {
            Some(attr) => self
                .resolver
                .recognizes(&attr.permission_name(self.namespace), attr.operation),
            None => false,
        }
    }

    /// Decides `attribute` on `subject` for `actor`. Anonymous actors,
    /// mismatching subjects and malformed attributes are denied.
    pub fn vote(
        &self,
        attribute: &str,
        subject: &dyn AuthorizationSubject,
        actor: Option<&Actor>,
    ) -> bool {
        let Some(actor) = actor else {
            debug!("Denying {attribute} on {} to anonymous actor", self.class);
            return false;
        };
        if subject.entity_class() != self.class {
            return false;
        }
        let Some(attr) = Attribute::parse(attribute) else {
            debug!("Denying malformed attribute '{attribute}' on {}", self.class);
            return false;
        };
        self.resolver
            .resolve(actor, &attr.permission_name(self.namespace), attr.operation)
    }
}

/// Holds one [EntityVoter] per registered [EntityClass] and answers
/// authorization queries by dispatching to the voter that supports them.
#[derive(Debug, Clone)]
pub struct VoterRegistry {
    resolver: Arc<PermissionResolver>,
    voters: Vec<EntityVoter>,
}

impl VoterRegistry {
    /// Registers a voter for every [EntityClass].
    pub fn try_new(resolver: Arc<PermissionResolver>) -> Result<Self> {
        Self::with_classes(resolver, &EntityClass::ALL)
    }

    pub fn with_classes(resolver: Arc<PermissionResolver>, classes: &[EntityClass]) -> Result<Self> {
        let voters = classes
            .iter()
            .map(|class| EntityVoter::try_new(*class, resolver.clone()))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Registered {} entity voters over {} permission sets",
            voters.len(),
            resolver.catalogue().len()
        );
        Ok(Self { resolver, voters })
    }

    pub fn resolver(&self) -> &Arc<PermissionResolver> {
        &self.resolver
    }

    pub fn voter_for(&self, class: EntityClass) -> Option<&EntityVoter> {
        self.voters.iter().find(|v| v.class() == class)
    }

    /// The authorization query surface. Never fails: anything that cannot be
    /// resolved to an explicit grant is denied.
    pub fn is_allowed(
        &self,
        actor: Option<&Actor>,
        subject: &dyn AuthorizationSubject,
        attribute: &str,
    ) -> bool {
        match self.voters.iter().find(|v| v.supports(attribute, subject)) {
            Some(voter) => voter.vote(attribute, subject, actor),
            None => {
                debug!(
                    "No voter supports {attribute} on {}, denying",
                    subject.entity_class()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::model::permission::{PermissionCatalogue, PermissionData, PermissionValue};
    use crate::model::structural::SubjectRef;
    use crate::model::user::User;

    fn registry() -> VoterRegistry {
        let catalogue = Arc::new(PermissionCatalogue::bundled().unwrap());
        VoterRegistry::try_new(Arc::new(PermissionResolver::new(catalogue, false))).unwrap()
    }

    fn actor(permissions: PermissionData) -> Actor {
        Actor::new(
            User {
                id: Uuid::new_v4(),
                name: "bob".into(),
                group_id: None,
                permissions,
                permissions_version: 0,
            },
            vec![],
        )
    }

    #[test]
    fn dotted_attribute_matches_direct_resolution() {
        let registry = registry();
        let part = SubjectRef {
            class: EntityClass::Part,
            id: Uuid::new_v4(),
        };
        let values = [
            PermissionValue::Allow,
            PermissionValue::Deny,
            PermissionValue::Inherit,
        ];
        for own in values {
            for parent in values {
                let actor = actor(
                    PermissionData::new()
                        .with("parts_name", "edit", own)
                        .with("parts", "edit", parent),
                );
                assert_eq!(
                    registry.is_allowed(Some(&actor), &part, "name.edit"),
                    registry.resolver().resolve(&actor, "parts_name", "edit"),
                );
            }
        }
    }

    #[test]
    fn bare_attribute_uses_root_namespace() {
        let registry = registry();
        let actor = actor(PermissionData::new().with("categories", "create", PermissionValue::Allow));
        assert!(registry.is_allowed(Some(&actor), &EntityClass::Category, "create"));
        assert!(!registry.is_allowed(Some(&actor), &EntityClass::Footprint, "create"));
    }

    #[test]
    fn anonymous_actor_is_denied() {
        let registry = registry();
        assert!(!registry.is_allowed(None, &EntityClass::Category, "read"));
    }

    #[test]
    fn supports_checks_class_and_catalogue() {
        let registry = registry();
        let voter = registry.voter_for(EntityClass::Part).unwrap();
        assert!(voter.supports("name.edit", &EntityClass::Part));
        assert!(!voter.supports("name.delete", &EntityClass::Part));
        assert!(!voter.supports("bogus.edit", &EntityClass::Part));
        assert!(!voter.supports("edit", &EntityClass::Category));
        assert!(!voter.supports("a.b.c", &EntityClass::Part));
    }

    #[test]
    fn vote_denies_mismatching_subject() {
        let registry = registry();
        let actor = actor(PermissionData::new().with("parts", "read", PermissionValue::Allow));
        let voter = registry.voter_for(EntityClass::Part).unwrap();
        assert!(voter.vote("read", &EntityClass::Part, Some(&actor)));
        assert!(!voter.vote("read", &EntityClass::Category, Some(&actor)));
    }

    #[test]
    fn unsupported_attributes_are_denied() {
        let registry = registry();
        let actor = actor(PermissionData::new().with("parts", "delete", PermissionValue::Allow));
        assert!(!registry.is_allowed(Some(&actor), &EntityClass::Part, "name.delete"));
        assert!(!registry.is_allowed(Some(&actor), &EntityClass::Part, ""));
    }

    #[test]
    fn missing_namespace_is_a_configuration_error() {
        let catalogue = PermissionCatalogue::from_yaml_str(
            "permissions:\n  - name: parts\n    operations: [read]\n",
        )
        .unwrap();
        let resolver = Arc::new(PermissionResolver::new(Arc::new(catalogue), false));
        assert!(VoterRegistry::with_classes(resolver.clone(), &[EntityClass::Part]).is_ok());
        assert!(matches!(
            VoterRegistry::try_new(resolver),
            Err(StockroomError::Configuration(_))
        ));
    }
}

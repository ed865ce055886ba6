use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use diesel::{AsExpression, FromSqlRow};
use diesel_as_jsonb::AsJsonb;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StockroomError};

/// Names of permission sets and operations must match this pattern. It keeps
/// dotted attributes (`name.edit`) and prefixed sub-permissions (`parts_name`)
/// unambiguous.
pub const IDENTIFIER_PATTERN: &str = r"^[a-z][a-z0-9_]*$";

const DEFAULT_CATALOGUE: &str = include_str!("../../catalogue/default.yaml");

/// Grant state of a single (permission set, operation) pair for one holder.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionValue {
    Allow,
    Deny,
    /// Defer to the next holder or the parent permission set.
    #[default]
    Inherit,
}

impl PermissionValue {
    /// Returns the decision this value makes on its own, if any.
    pub fn decision(&self) -> Option<bool> {
        match self {
            PermissionValue::Allow => Some(true),
            PermissionValue::Deny => Some(false),
            PermissionValue::Inherit => None,
        }
    }
}

/// Per holder (user or group) mapping of (permission set, operation) to a
/// [PermissionValue]. Absent entries read as [PermissionValue::Inherit].
#[derive(Serialize, Deserialize, Debug, AsJsonb, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct PermissionData {
    entries: BTreeMap<String, BTreeMap<String, PermissionValue>>,
}

impl PermissionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, permission: &str, operation: &str) -> PermissionValue {
        self.entries
            .get(permission)
            .and_then(|ops| ops.get(operation))
            .copied()
            .unwrap_or_default()
    }

    /// Sets a value. Writing [PermissionValue::Inherit] removes the entry so
    /// that the stored document only carries explicit decisions.
    pub fn set(&mut self, permission: &str, operation: &str, value: PermissionValue) {
        match value {
            PermissionValue::Inherit => {
                if let Some(ops) = self.entries.get_mut(permission) {
                    ops.remove(operation);
                    if ops.is_empty() {
                        self.entries.remove(permission);
                    }
                }
            }
            _ => {
                self.entries
                    .entry(permission.to_string())
                    .or_default()
                    .insert(operation.to_string(), value);
            }
        }
    }

    pub fn with(mut self, permission: &str, operation: &str, value: PermissionValue) -> Self {
        self.set(permission, operation, value);
        self
    }

    /// True when no explicit allow or deny is stored.
    pub fn is_empty(&self) -> bool {
        self.entries
            .values()
            .all(|ops| ops.values().all(|v| *v == PermissionValue::Inherit))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, PermissionValue)> {
        self.entries.iter().flat_map(|(permission, ops)| {
            ops.iter()
                .map(move |(op, value)| (permission.as_str(), op.as_str(), *value))
        })
    }
}

/// A named group of operations with an optional parent set used as
/// inheritance fallback.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PermissionSet {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    pub operations: Vec<String>,
}

impl PermissionSet {
    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op == operation)
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct CatalogueDocument {
    permissions: Vec<PermissionSet>,
}

/// The validated, immutable set of all [PermissionSet]s known to the system.
/// Construction fails for unknown parents, parent cycles, duplicate names or
/// malformed identifiers, so every catalogue in memory has a finite, acyclic
/// parent forest.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionCatalogue {
    sets: BTreeMap<String, PermissionSet>,
}

impl PermissionCatalogue {
    pub fn try_new(sets: Vec<PermissionSet>) -> Result<Self> {
        let ident = Regex::new(IDENTIFIER_PATTERN)?;
        let mut by_name = BTreeMap::new();

        for set in sets {
            if !ident.is_match(&set.name) {
                return Err(StockroomError::Configuration(format!(
                    "permission set name '{}' must match {IDENTIFIER_PATTERN}",
                    set.name
                )));
            }
            if set.operations.is_empty() {
                return Err(StockroomError::Configuration(format!(
                    "permission set '{}' declares no operations",
                    set.name
                )));
            }
            let mut seen = HashSet::new();
            for op in &set.operations {
                if !ident.is_match(op) {
                    return Err(StockroomError::Configuration(format!(
                        "operation '{}' of permission set '{}' must match {IDENTIFIER_PATTERN}",
                        op, set.name
                    )));
                }
                if !seen.insert(op.as_str()) {
                    return Err(StockroomError::Configuration(format!(
                        "operation '{}' is declared twice on permission set '{}'",
                        op, set.name
                    )));
                }
            }
            if by_name.contains_key(&set.name) {
                return Err(StockroomError::Configuration(format!(
                    "permission set '{}' is declared twice",
                    set.name
                )));
            }
            by_name.insert(set.name.clone(), set);
        }

        let catalogue = PermissionCatalogue { sets: by_name };
        catalogue.check_parents()?;
        Ok(catalogue)
    }

    fn check_parents(&self) -> Result<()> {
        for set in self.sets.values() {
            let mut visited = vec![set.name.as_str()];
            let mut current = set;
            while let Some(parent_name) = &current.parent {
                let parent = self.sets.get(parent_name).ok_or_else(|| {
                    StockroomError::Configuration(format!(
                        "permission set '{}' declares unknown parent '{}'",
                        current.name, parent_name
                    ))
                })?;
                if visited.contains(&parent.name.as_str()) {
                    visited.push(parent.name.as_str());
                    return Err(StockroomError::Configuration(format!(
                        "cyclic permission set parents: {}",
                        visited.join(" -> ")
                    )));
                }
                visited.push(parent.name.as_str());
                current = parent;
            }
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: CatalogueDocument = serde_yaml::from_str(yaml)
            .map_err(|e| StockroomError::Configuration(format!("unreadable catalogue: {e}")))?;
        Self::try_new(doc.permissions)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// The catalogue bundled with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_CATALOGUE)
    }

    pub fn get(&self, name: &str) -> Option<&PermissionSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Whether `operation` is declared on the permission set `name`.
    pub fn recognizes(&self, name: &str, operation: &str) -> bool {
        self.sets
            .get(name)
            .map(|set| set.has_operation(operation))
            .unwrap_or(false)
    }

    /// The set itself followed by its ancestors, most specific first. Empty if
    /// `name` is unknown.
    pub fn parent_chain(&self, name: &str) -> Vec<&PermissionSet> {
        let mut chain = Vec::new();
        let mut next = self.sets.get(name);
        while let Some(set) = next {
            // acyclic by construction, the bound only guards against misuse
            if chain.len() > self.sets.len() {
                break;
            }
            chain.push(set);
            next = set.parent.as_ref().and_then(|p| self.sets.get(p));
        }
        chain
    }

    pub fn sets(&self) -> impl Iterator<Item = &PermissionSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Rejects administration input that names permission sets or operations
    /// this catalogue does not declare.
    pub fn validate_permission_data(&self, data: &PermissionData) -> Result<()> {
        for (permission, operation, _) in data.iter() {
            if !self.recognizes(permission, operation) {
                return Err(StockroomError::InvalidRequest(format!(
                    "unknown permission '{permission}.{operation}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str, parent: Option<&str>, ops: &[&str]) -> PermissionSet {
        PermissionSet {
            name: name.to_string(),
            label: None,
            parent: parent.map(|p| p.to_string()),
            operations: ops.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn bundled_catalogue_is_valid() -> Result<()> {
        let catalogue = PermissionCatalogue::bundled()?;
        assert!(catalogue.recognizes("parts", "edit"));
        assert!(catalogue.recognizes("parts_name", "edit"));
        assert!(!catalogue.recognizes("parts_name", "delete"));
        let chain: Vec<_> = catalogue
            .parent_chain("parts_name")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(chain, vec!["parts_name", "parts"]);
        Ok(())
    }

    #[test]
    fn rejects_unknown_parent() {
        let err = PermissionCatalogue::try_new(vec![set("parts_name", Some("parts"), &["read"])])
            .expect_err("unknown parent should be rejected")
            .to_string();
        assert_eq!(
            err,
            "Invalid configuration: permission set 'parts_name' declares unknown parent 'parts'"
        );
    }

    #[test]
    fn rejects_parent_cycle() {
        let err = PermissionCatalogue::try_new(vec![
            set("a", Some("c"), &["read"]),
            set("b", Some("a"), &["read"]),
            set("c", Some("b"), &["read"]),
        ])
        .expect_err("cycle should be rejected")
        .to_string();
        assert_eq!(
            err,
            "Invalid configuration: cyclic permission set parents: a -> c -> b -> a"
        );
    }

    #[test]
    fn rejects_self_parent() {
        assert!(matches!(
            PermissionCatalogue::try_new(vec![set("a", Some("a"), &["read"])]),
            Err(StockroomError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert!(PermissionCatalogue::try_new(vec![set("Parts", None, &["read"])]).is_err());
        assert!(PermissionCatalogue::try_new(vec![set("parts", None, &["re.ad"])]).is_err());
        assert!(PermissionCatalogue::try_new(vec![set("parts", None, &[])]).is_err());
        assert!(PermissionCatalogue::try_new(vec![set("parts", None, &["read", "read"])]).is_err());
        assert!(PermissionCatalogue::try_new(vec![
            set("parts", None, &["read"]),
            set("parts", None, &["edit"]),
        ])
        .is_err());
    }

    #[test]
    fn parses_yaml() -> Result<()> {
        let yaml = r#"
permissions:
  - name: parts
    operations: [read, edit]
  - name: parts_name
    parent: parts
    operations: [read, edit]
"#;
        let catalogue = PermissionCatalogue::from_yaml_str(yaml)?;
        assert_eq!(catalogue.len(), 2);
        assert_eq!(
            catalogue.get("parts_name").and_then(|s| s.parent.as_deref()),
            Some("parts")
        );
        Ok(())
    }

    #[test]
    fn permission_data_json_shape() -> Result<()> {
        let data = PermissionData::new()
            .with("parts", "edit", PermissionValue::Allow)
            .with("parts_name", "edit", PermissionValue::Deny);
        let json = serde_json::to_string(&data)?;
        assert_eq!(json, r#"{"parts":{"edit":"allow"},"parts_name":{"edit":"deny"}}"#);

        let back: PermissionData = serde_json::from_str(&json)?;
        assert_eq!(back.get("parts", "edit"), PermissionValue::Allow);
        assert_eq!(back.get("parts", "read"), PermissionValue::Inherit);
        Ok(())
    }

    #[test]
    fn setting_inherit_clears_entry() {
        let mut data = PermissionData::new().with("parts", "edit", PermissionValue::Allow);
        assert!(!data.is_empty());
        data.set("parts", "edit", PermissionValue::Inherit);
        assert!(data.is_empty());
        assert_eq!(data.iter().count(), 0);
    }

    #[test]
    fn validates_permission_data_against_catalogue() -> Result<()> {
        let catalogue = PermissionCatalogue::bundled()?;
        let ok = PermissionData::new().with("parts_name", "edit", PermissionValue::Allow);
        catalogue.validate_permission_data(&ok)?;

        let bad = PermissionData::new().with("parts_name", "delete", PermissionValue::Allow);
        assert!(matches!(
            catalogue.validate_permission_data(&bad),
            Err(StockroomError::InvalidRequest(_))
        ));
        Ok(())
    }
}

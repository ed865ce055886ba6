use std::collections::HashSet;
use std::iter;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use stockroom::authz::resolver::{PermissionResolver, ResolutionSource};
use stockroom::crud::PgDb;
use stockroom::error::{Result, StockroomError};
use stockroom::model::config_commands::structure::{NodeDeclaration, StructureDeclaration};
use stockroom::model::config_commands::user::{GroupDeclaration, UserDeclaration};
use stockroom::model::config_commands::{ConfigCommand, ConfigObject};
use stockroom::model::permission::{PermissionCatalogue, PermissionData};
use stockroom::model::structural::NewStructuralEntity;
use stockroom::model::user::{Actor, NewGroup, NewUser};
use tracing::debug;

/// What every config object is validated against before it is written.
pub(crate) struct ApplyContext<'c> {
    pub(crate) catalogue: &'c PermissionCatalogue,
    pub(crate) max_depth: usize,
}

/// Parses every config object below `path`, validates it and applies it in
/// order of its apply precedence. Objects which fail are reported and skipped.
pub(crate) async fn process_configs(
    db: &mut PgDb<'_>,
    path: PathBuf,
    ctx: &ApplyContext<'_>,
) -> Result<()> {
    let (mut groups, others): (Vec<_>, Vec<_>) = parse_directory(path, ctx)
        .into_iter()
        .partition(|(_, obj)| matches!(obj, ConfigObject::Group(_)));

    let group_decls = groups
        .drain(..)
        .filter_map(|(filepath, obj)| match obj {
            ConfigObject::Group(group) => Some((filepath, group)),
            _ => None,
        })
        .collect_vec();
    for (filepath, group) in order_groups_parent_first(group_decls)? {
        report(&filepath, apply_group(db, group, ctx).await);
    }

    for (filepath, obj) in others {
        let result = match obj {
            ConfigObject::User(user) => apply_user(db, user).await,
            ConfigObject::Structure(structure) => apply_structure(db, structure).await,
            ConfigObject::Group(_) => continue,
        };
        report(&filepath, result);
    }
    Ok(())
}

fn report(filepath: &str, result: Result<()>) {
    match result {
        Ok(()) => println!("{} applied!", filepath),
        Err(e) => println!("Unable to apply config file at {} with error {e}", filepath),
    }
}

/// Parses and validates all objects found by recursively walking the provided
/// path, sorted by their apply precedence.
fn parse_directory(path: PathBuf, ctx: &ApplyContext<'_>) -> Vec<(String, ConfigObject)> {
    let mut objects = walk_directory(path)
        .filter_map(|filepath| match try_read_as_config_command(&filepath) {
            Ok(cmds) => Some(
                iter::repeat(filepath.to_string_lossy().to_string())
                    .zip(cmds)
                    .collect_vec(),
            ),
            Err(e) => {
                println!(
                    "Unable to parse file at {} with error {e}",
                    filepath.to_string_lossy()
                );
                None
            }
        })
        .flatten()
        .filter_map(|(filepath, cmd)| {
            match cmd.config_object.validate(ctx.catalogue, ctx.max_depth) {
                Ok(()) => Some((filepath, cmd.config_object)),
                Err(e) => {
                    println!("Invalid config object in {} with error {e}", filepath);
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    objects.sort_by_key(|(_, obj)| obj.apply_precedence());
    objects
}

/// Orders group declarations so that a group declared in the same batch as its
/// parent is applied after the parent.
pub(crate) fn order_groups_parent_first(
    groups: Vec<(String, GroupDeclaration)>,
) -> Result<Vec<(String, GroupDeclaration)>> {
    let declared: HashSet<String> = groups.iter().map(|(_, g)| g.name.clone()).collect();
    let mut placed = HashSet::new();
    let mut pending = groups;
    let mut ordered = vec![];
    while !pending.is_empty() {
        let (ready, rest): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|(_, g)| match &g.parent {
                None => true,
                Some(parent) => !declared.contains(parent) || placed.contains(parent),
            });
        if ready.is_empty() {
            return Err(StockroomError::InvalidRequest(format!(
                "declared groups have cyclic parents: {}",
                rest.iter().map(|(_, g)| g.name.as_str()).sorted().join(", ")
            )));
        }
        placed.extend(ready.iter().map(|(_, g)| g.name.clone()));
        ordered.extend(ready);
        pending = rest;
    }
    Ok(ordered)
}

async fn apply_group(
    db: &mut PgDb<'_>,
    group: GroupDeclaration,
    ctx: &ApplyContext<'_>,
) -> Result<()> {
    let parent_id = match &group.parent {
        Some(parent) => {
            let parent = db.get_group_by_name(parent).await?;
            let ancestors = db.get_group_chain(Some(parent.id), ctx.max_depth).await?;
            if ancestors.iter().any(|g| g.name == group.name) {
                return Err(StockroomError::InvalidRequest(format!(
                    "group {} cannot inherit from its own descendant {}",
                    group.name, parent.name
                )));
            }
            Some(parent.id)
        }
        None => None,
    };
    let new_group = NewGroup {
        name: group.name,
        parent_id,
        comment: group.comment,
        permissions: group.permissions,
    };
    let stored = db.upsert_group(&new_group).await?;
    debug!("Upserted group {} ({})", stored.name, stored.id);
    Ok(())
}

async fn apply_user(db: &mut PgDb<'_>, user: UserDeclaration) -> Result<()> {
    let group_id = match &user.group {
        Some(group) => Some(db.get_group_by_name(group).await?.id),
        None => None,
    };
    let new_user = NewUser {
        name: user.name,
        group_id,
        permissions: user.permissions,
    };
    let stored = db.upsert_user(&new_user).await?;
    debug!(
        "Upserted user {} at permission version {}",
        stored.name, stored.permissions_version
    );
    Ok(())
}

/// Creates every declared node missing under its parent. Existing nodes are
/// matched by name and left untouched.
async fn apply_structure(db: &mut PgDb<'_>, structure: StructureDeclaration) -> Result<()> {
    let class = structure.class;
    let mut stack: Vec<(Option<_>, &NodeDeclaration)> =
        structure.nodes.iter().rev().map(|n| (None, n)).collect();
    let mut created = 0;
    while let Some((parent_id, node)) = stack.pop() {
        let id = match db.find_structural_child(class, parent_id, &node.name).await? {
            Some(existing) => existing.id,
            None => {
                let new_entity = NewStructuralEntity {
                    name: node.name.clone(),
                    parent_id,
                    comment: node.comment.clone(),
                };
                created += 1;
                db.create_structural_entity(class, &new_entity).await?.id
            }
        };
        stack.extend(node.children.iter().rev().map(|child| (Some(id), child)));
    }
    println!(
        "Created {created} of {} declared {class} entities",
        structure.nodes.iter().map(NodeDeclaration::count).sum::<usize>()
    );
    Ok(())
}

/// One line per catalogue set: its name, parent and operations.
pub(crate) fn summarize_catalogue(catalogue: &PermissionCatalogue) -> Vec<String> {
    catalogue
        .sets()
        .map(|set| {
            format!(
                "{}{}: {}",
                set.name,
                set.parent
                    .as_ref()
                    .map(|p| format!(" (inherits {p})"))
                    .unwrap_or_default(),
                set.operations.join(", ")
            )
        })
        .collect()
}

/// The effective permission of `actor` for every operation of every set in the
/// catalogue, with the holder that decided it.
pub(crate) fn explain_matrix(resolver: &PermissionResolver, actor: &Actor) -> Vec<String> {
    resolver
        .catalogue()
        .sets()
        .flat_map(|set| set.operations.iter().map(move |op| (set.name.as_str(), op.as_str())))
        .map(|(permission, operation)| {
            let resolution = resolver.explain(actor, permission, operation);
            let source = match &resolution.source {
                ResolutionSource::User => format!("user via {}", resolution.permission),
                ResolutionSource::Group(name) => {
                    format!("group {name} via {}", resolution.permission)
                }
                ResolutionSource::Default => "default".to_string(),
                ResolutionSource::Undeclared => "undeclared".to_string(),
            };
            format!(
                "{permission}.{operation}: {} ({source})",
                if resolution.allowed { "ALLOW" } else { "DENY" }
            )
        })
        .collect()
}

pub(crate) fn count_overrides(data: &PermissionData) -> usize {
    data.iter().count()
}

fn try_read_as_config_command(path: &Path) -> Result<impl Iterator<Item = ConfigCommand>> {
    let f = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(f);
    let filename = path.to_string_lossy().to_string();
    let mut obj = vec![];
    for document in serde_yaml::Deserializer::from_reader(reader) {
        match serde_yaml::with::singleton_map_recursive::deserialize(document) {
            Ok(cmd) => obj.push(cmd),
            Err(e) => {
                println!(
                    "Unable to deserialize object as YAML from file {} with error {}",
                    filename, e,
                );
            }
        }
    }
    Ok(obj.into_iter())
}

fn walk_directory(dir: PathBuf) -> impl Iterator<Item = PathBuf> {
    walkdir::WalkDir::new(dir).into_iter().filter_map(|r| match r {
        Err(e) => {
            println!("Error walking directory: {}", e);
            None
        }
        Ok(entry) if entry.path().is_dir() => None,
        Ok(entry) => Some(entry.into_path()),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use stockroom::model::permission::PermissionValue;
    use stockroom::model::user::{Group, User};
    use std::sync::Arc;
    use uuid::Uuid;

    use super::*;

    fn group_decl(name: &str, parent: Option<&str>) -> (String, GroupDeclaration) {
        (
            format!("{name}.yaml"),
            GroupDeclaration {
                name: name.into(),
                parent: parent.map(String::from),
                comment: String::new(),
                permissions: PermissionData::new(),
            },
        )
    }

    #[test]
    fn groups_are_ordered_parent_first() -> Result<()> {
        let ordered = order_groups_parent_first(vec![
            group_decl("editors", Some("staff")),
            group_decl("staff", Some("everyone")),
            group_decl("admins", Some("existing")),
            group_decl("everyone", None),
        ])?;
        let names = ordered.iter().map(|(_, g)| g.name.as_str()).collect_vec();
        assert_eq!(names, vec!["admins", "everyone", "staff", "editors"]);
        Ok(())
    }

    #[test]
    fn cyclic_group_batches_are_rejected() {
        let err = order_groups_parent_first(vec![
            group_decl("a", Some("b")),
            group_decl("b", Some("a")),
            group_decl("c", None),
        ])
        .expect_err("cycle");
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn reads_multi_document_files() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("stockctl-{}", Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("nested"))?;
        let mut f = std::fs::File::create(dir.join("nested").join("groups.yaml"))?;
        writeln!(
            f,
            "api_version: v1\nconfig_object:\n  kind: Group\n  spec:\n    name: everyone\n---\n\
             api_version: v1\nconfig_object:\n  kind: Group\n  spec:\n    name: staff\n    parent: everyone\n    permissions:\n      parts:\n        teleport: allow\n"
        )?;

        let catalogue = PermissionCatalogue::bundled()?;
        let ctx = ApplyContext {
            catalogue: &catalogue,
            max_depth: 8,
        };
        let files = walk_directory(dir.clone()).collect_vec();
        assert_eq!(files.len(), 1);
        assert_eq!(try_read_as_config_command(&files[0])?.count(), 2);

        // the second group names an unknown operation and is dropped
        let objects = parse_directory(dir.clone(), &ctx);
        assert_eq!(objects.len(), 1);
        std::fs::remove_dir_all(dir)?;
        Ok(())
    }

    #[test]
    fn explains_effective_permissions() -> Result<()> {
        let catalogue = Arc::new(PermissionCatalogue::bundled()?);
        let resolver = PermissionResolver::new(catalogue.clone(), false);
        let group = Group {
            id: Uuid::new_v4(),
            name: "staff".into(),
            parent_id: None,
            comment: String::new(),
            permissions: PermissionData::new().with("parts", "read", PermissionValue::Allow),
        };
        let user = User {
            id: Uuid::new_v4(),
            name: "erin".into(),
            group_id: Some(group.id),
            permissions: PermissionData::new().with("parts_name", "read", PermissionValue::Deny),
            permissions_version: 0,
        };
        assert_eq!(count_overrides(&user.permissions), 1);
        let matrix = explain_matrix(&resolver, &Actor::new(user, vec![group]));

        assert!(matrix.contains(&"parts.read: ALLOW (group staff via parts)".to_string()));
        assert!(matrix.contains(&"parts_name.read: DENY (user via parts_name)".to_string()));
        assert!(matrix.contains(&"parts_description.read: ALLOW (group staff via parts)".to_string()));
        assert!(matrix.contains(&"parts.edit: DENY (default)".to_string()));
        assert_eq!(summarize_catalogue(&catalogue).len(), catalogue.len());
        Ok(())
    }
}

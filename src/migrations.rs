//! Reversible schema migrations.
//!
//! Every change applied to a [`SchemaState`] hands back the change that undoes
//! it, carrying whatever the forward step removed. The [`Migrator`] keeps
//! those inverses on a stack, so rolling back replays them in reverse order
//! and lands on exactly the state the migration started from.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::collections::{self, Collection, Field};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("collection {0} not found")]
    UnknownCollection(String),
    #[error("collection {0} already exists")]
    DuplicateCollection(String),
    #[error("field {field} already exists in {collection}")]
    DuplicateField { collection: String, field: String },
    #[error("field {field} not found in {collection}")]
    UnknownField { collection: String, field: String },
    #[error("relation in {collection} points at missing collection {target}")]
    DanglingRelation { collection: String, target: String },
    #[error("collection {collection} is still referenced by {referenced_by}")]
    StillReferenced {
        collection: String,
        referenced_by: String,
    },
    #[error("no applied migrations to revert")]
    NothingToRevert,
}

/// Collections keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaState {
    collections: BTreeMap<String, Collection>,
}

impl SchemaState {
    /// State of a fresh backend: only the built-in `users` collection.
    pub fn baseline() -> Self {
        let mut state = Self::default();
        let users = collections::users_collection();
        state.collections.insert(users.id.clone(), users);
        state
    }

    /// Look up by id or name.
    pub fn collection(&self, id_or_name: &str) -> Option<&Collection> {
        self.collections
            .get(id_or_name)
            .or_else(|| self.collections.values().find(|c| c.name == id_or_name))
    }

    fn collection_mut(&mut self, id_or_name: &str) -> Result<&mut Collection, MigrationError> {
        let id = self
            .collection(id_or_name)
            .map(|c| c.id.clone())
            .ok_or_else(|| MigrationError::UnknownCollection(id_or_name.to_string()))?;
        self.collections
            .get_mut(&id)
            .ok_or(MigrationError::UnknownCollection(id))
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Payload for the backend's collections import endpoint.
    pub fn to_import_payload(&self) -> Value {
        let collections: Vec<&Collection> = self.collections().filter(|c| !c.system).collect();
        serde_json::json!({ "collections": collections, "deleteMissing": false })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateCollection(Collection),
    DeleteCollection { id: String },
    /// Insert `field` at `index` (clamped to the field count).
    AddField {
        collection: String,
        index: usize,
        field: Field,
    },
    RemoveField { collection: String, field_id: String },
}

impl SchemaChange {
    /// Apply to `state`, returning the change that reverts it.
    pub fn apply(&self, state: &mut SchemaState) -> Result<SchemaChange, MigrationError> {
        match self {
            Self::CreateCollection(collection) => {
                if state.collection(&collection.id).is_some() || state.collection(&collection.name).is_some() {
                    return Err(MigrationError::DuplicateCollection(collection.name.clone()));
                }
                for target in collection.relation_targets() {
                    if target != collection.id && state.collection(target).is_none() {
                        return Err(MigrationError::DanglingRelation {
                            collection: collection.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
                state.collections.insert(collection.id.clone(), collection.clone());
                Ok(Self::DeleteCollection { id: collection.id.clone() })
            }
            Self::DeleteCollection { id } => {
                let target = state
                    .collection(id)
                    .ok_or_else(|| MigrationError::UnknownCollection(id.clone()))?;
                let target_id = target.id.clone();
                if let Some(referrer) = state
                    .collections()
                    .find(|c| c.id != target_id && c.relation_targets().any(|t| t == target_id))
                {
                    return Err(MigrationError::StillReferenced {
                        collection: target.name.clone(),
                        referenced_by: referrer.name.clone(),
                    });
                }
                let removed = state
                    .collections
                    .remove(&target_id)
                    .ok_or(MigrationError::UnknownCollection(target_id))?;
                Ok(Self::CreateCollection(removed))
            }
            Self::AddField { collection, index, field } => {
                if let Some(target) = field.relation_target() {
                    if state.collection(target).is_none() {
                        return Err(MigrationError::DanglingRelation {
                            collection: collection.clone(),
                            target: target.to_string(),
                        });
                    }
                }
                let entry = state.collection_mut(collection)?;
                if entry.fields.iter().any(|f| f.id == field.id || f.name == field.name) {
                    return Err(MigrationError::DuplicateField {
                        collection: entry.name.clone(),
                        field: field.name.clone(),
                    });
                }
                let at = (*index).min(entry.fields.len());
                entry.fields.insert(at, field.clone());
                Ok(Self::RemoveField {
                    collection: entry.id.clone(),
                    field_id: field.id.clone(),
                })
            }
            Self::RemoveField { collection, field_id } => {
                let entry = state.collection_mut(collection)?;
                let at = entry
                    .field_position(field_id)
                    .ok_or_else(|| MigrationError::UnknownField {
                        collection: entry.name.clone(),
                        field: field_id.clone(),
                    })?;
                let field = entry.fields.remove(at);
                Ok(Self::AddField {
                    collection: entry.id.clone(),
                    index: at,
                    field,
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u64,
    pub name: &'static str,
    pub changes: Vec<SchemaChange>,
}

/// The application's migrations, oldest first.
pub fn all() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "initial_schema",
            changes: vec![SchemaChange::CreateCollection(collections::todos_collection())],
        },
        Migration {
            version: 1_760_523_032,
            name: "created_posts",
            changes: vec![SchemaChange::CreateCollection(collections::posts_collection())],
        },
        Migration {
            version: 1_760_523_033,
            name: "updated_posts",
            changes: vec![
                SchemaChange::AddField {
                    collection: collections::POSTS_COLLECTION_ID.to_string(),
                    index: 3,
                    field: collections::posts_published_field(),
                },
                SchemaChange::AddField {
                    collection: collections::POSTS_COLLECTION_ID.to_string(),
                    index: 4,
                    field: collections::posts_description_field(),
                },
            ],
        },
    ]
}

struct Applied {
    version: u64,
    /// Inverses in application order; replayed back to front.
    undo: Vec<SchemaChange>,
}

pub struct Migrator {
    state: SchemaState,
    migrations: Vec<Migration>,
    applied: Vec<Applied>,
}

impl Migrator {
    pub fn new(state: SchemaState, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        Self {
            state,
            migrations,
            applied: Vec::new(),
        }
    }

    pub fn state(&self) -> &SchemaState {
        &self.state
    }

    pub fn applied_versions(&self) -> Vec<u64> {
        self.applied.iter().map(|a| a.version).collect()
    }

    /// Apply every pending migration. A failing migration is rolled back
    /// on its own and the error returned; earlier ones stay applied.
    pub fn up(&mut self) -> Result<usize, MigrationError> {
        let last = self.applied.last().map(|a| a.version);
        let pending: Vec<Migration> = self
            .migrations
            .iter()
            .filter(|m| last.map_or(true, |v| m.version > v))
            .cloned()
            .collect();

        for migration in &pending {
            let mut undo = Vec::with_capacity(migration.changes.len());
            for change in &migration.changes {
                match change.apply(&mut self.state) {
                    Ok(inverse) => undo.push(inverse),
                    Err(err) => {
                        revert(&mut self.state, &undo)?;
                        tracing::error!(version = migration.version, name = migration.name, error = %err, "migration failed");
                        return Err(err);
                    }
                }
            }
            tracing::info!(version = migration.version, name = migration.name, "migration applied");
            self.applied.push(Applied {
                version: migration.version,
                undo,
            });
        }
        Ok(pending.len())
    }

    /// Revert the last `count` applied migrations.
    pub fn down(&mut self, count: usize) -> Result<(), MigrationError> {
        if count > 0 && self.applied.is_empty() {
            return Err(MigrationError::NothingToRevert);
        }
        for _ in 0..count {
            let Some(applied) = self.applied.pop() else {
                break;
            };
            revert(&mut self.state, &applied.undo)?;
            tracing::info!(version = applied.version, "migration reverted");
        }
        Ok(())
    }
}

fn revert(state: &mut SchemaState, undo: &[SchemaChange]) -> Result<(), MigrationError> {
    for change in undo.iter().rev() {
        change.apply(state)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "migrations_test.rs"]
mod tests;

//! Declarative collection definitions.
//!
//! These mirror the backend's collection JSON so they can be pushed through
//! the collections import endpoint. Rules are opaque filter strings evaluated
//! by the backend; the application only has to satisfy them by attaching the
//! caller's token and setting `user` on create.

use serde::{Deserialize, Serialize};

pub const USERS_COLLECTION_ID: &str = "_pb_users_auth_";
pub const TODOS_COLLECTION_ID: &str = "todos_collection";
pub const POSTS_COLLECTION_ID: &str = "pbc_1125843985";

pub const USERS: &str = "users";
pub const TODOS: &str = "todos";
pub const POSTS: &str = "posts";

/// Owner-only predicate for list/view/update/delete on todos.
pub const OWNER_RULE: &str = r#"@request.auth.id != "" && user.id = @request.auth.id"#;
/// Owner-only predicate for create: the submitted `user` must be the caller.
pub const OWNER_CREATE_RULE: &str = r#"@request.auth.id != "" && @request.body.user = @request.auth.id"#;
/// Users may only see and change their own auth record.
pub const SELF_RULE: &str = "id = @request.auth.id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Base,
    Auth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text {
        #[serde(default)]
        min: u32,
        /// `0` means unbounded.
        #[serde(default)]
        max: u32,
        #[serde(default)]
        pattern: String,
    },
    Editor,
    Bool,
    Email,
    Relation {
        #[serde(rename = "collectionId")]
        collection_id: String,
        #[serde(rename = "cascadeDelete", default)]
        cascade_delete: bool,
        #[serde(rename = "minSelect", default)]
        min_select: u32,
        #[serde(rename = "maxSelect", default)]
        max_select: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub presentable: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    fn new(id: &str, name: &str, kind: FieldKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            required: false,
            hidden: false,
            presentable: false,
            system: false,
            kind,
        }
    }

    pub fn text(id: &str, name: &str, min: u32, max: u32) -> Self {
        Self::new(id, name, FieldKind::Text { min, max, pattern: String::new() })
    }

    pub fn editor(id: &str, name: &str) -> Self {
        Self::new(id, name, FieldKind::Editor)
    }

    pub fn bool(id: &str, name: &str) -> Self {
        Self::new(id, name, FieldKind::Bool)
    }

    pub fn email(id: &str, name: &str) -> Self {
        Self::new(id, name, FieldKind::Email)
    }

    pub fn relation(id: &str, name: &str, collection_id: &str, cascade_delete: bool) -> Self {
        Self::new(
            id,
            name,
            FieldKind::Relation {
                collection_id: collection_id.to_string(),
                cascade_delete,
                min_select: 0,
                max_select: 1,
            },
        )
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Target collection id when this is a relation field.
    pub fn relation_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { collection_id, .. } => Some(collection_id),
            _ => None,
        }
    }
}

/// Per-operation access rules. `None` locks the operation to superusers,
/// `Some("")` opens it to everyone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    pub list_rule: Option<String>,
    pub view_rule: Option<String>,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

impl Rules {
    /// Anyone may list and view; writes are left to superusers.
    pub fn public_read() -> Self {
        Self {
            list_rule: Some(String::new()),
            view_rule: Some(String::new()),
            ..Self::default()
        }
    }

    pub fn owner_only() -> Self {
        let owner = Some(OWNER_RULE.to_string());
        Self {
            list_rule: owner.clone(),
            view_rule: owner.clone(),
            create_rule: Some(OWNER_CREATE_RULE.to_string()),
            update_rule: owner.clone(),
            delete_rule: owner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    #[serde(default)]
    pub system: bool,
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub rules: Rules,
}

impl Collection {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_position(&self, field_id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == field_id)
    }

    /// Ids of the collections this one points at through relation fields.
    pub fn relation_targets(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(Field::relation_target)
    }
}

/// Built-in auth collection every backend instance starts with.
pub fn users_collection() -> Collection {
    let self_only = Some(SELF_RULE.to_string());
    Collection {
        id: USERS_COLLECTION_ID.to_string(),
        name: USERS.to_string(),
        kind: CollectionKind::Auth,
        system: false,
        fields: vec![
            Field::email("email3885137012", "email").required().system(),
            Field::bool("bool1547992806", "verified").system(),
        ],
        rules: Rules {
            list_rule: self_only.clone(),
            view_rule: self_only.clone(),
            create_rule: Some(String::new()),
            update_rule: self_only.clone(),
            delete_rule: self_only,
        },
    }
}

pub fn todos_collection() -> Collection {
    Collection {
        id: TODOS_COLLECTION_ID.to_string(),
        name: TODOS.to_string(),
        kind: CollectionKind::Base,
        system: false,
        fields: vec![
            Field::text("todo_name", "name", 1, 255).required(),
            Field::bool("todo_completed", "completed"),
            Field::text("todo_description", "description", 0, 0),
            Field::relation("todo_user", "user", USERS_COLLECTION_ID, true).required(),
        ],
        rules: Rules::owner_only(),
    }
}

/// Posts as first created; `published` and `description` arrive later.
pub fn posts_collection() -> Collection {
    Collection {
        id: POSTS_COLLECTION_ID.to_string(),
        name: POSTS.to_string(),
        kind: CollectionKind::Base,
        system: false,
        fields: vec![
            Field::text("text724990059", "title", 0, 0),
            Field::editor("editor4274335913", "content"),
        ],
        rules: Rules::public_read(),
    }
}

pub fn posts_published_field() -> Field {
    Field::bool("bool1748787223", "published")
}

pub fn posts_description_field() -> Field {
    Field::text("text1843675174", "description", 0, 0)
}

#[cfg(test)]
#[path = "collections_test.rs"]
mod tests;

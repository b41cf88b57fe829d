use serde::Deserialize;

use crate::model::TodoPatch;

// Request body for logging in
#[derive(Debug, Deserialize)]
pub struct LoginSchema {
    pub email: String,
    pub password: String,
}

// Request body for registering a new user
#[derive(Debug, Deserialize)]
pub struct RegisterSchema {
    pub email: String,
    pub password: String,
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: String,
}

// Request body for creating a new Todo; the owner comes from the session
#[derive(Debug, Deserialize)]
pub struct CreateTodoSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

// Request body for updating a Todo; absent fields are left as they are
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoSchema {
    pub name: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl From<UpdateTodoSchema> for TodoPatch {
    fn from(body: UpdateTodoSchema) -> Self {
        Self {
            name: body.name,
            description: body.description,
            completed: body.completed,
        }
    }
}

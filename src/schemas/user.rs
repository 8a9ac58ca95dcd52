use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(email(message = "invalid email address"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserLogin {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[validate(email(message = "invalid email address"))]
    pub(crate) email: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub(crate) password: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
    #[serde(default = "default_true")]
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: crate::db::models::User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}

fn default_user_role() -> UserRole {
    UserRole::Student
}

fn default_true() -> bool {
    true
}

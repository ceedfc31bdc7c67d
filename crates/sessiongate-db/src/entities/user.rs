//! User entity: profile plus password hash

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use sessiongate_auth::Role;

/// Role column, stored as its upper-case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum UserRole {
    #[sea_orm(string_value = "ADMIN")]
    Admin,

    #[sea_orm(string_value = "USER")]
    User,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => UserRole::Admin,
            Role::User => UserRole::User,
        }
    }
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Role::Admin,
            UserRole::User => Role::User,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Opaque user id (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Normalized email (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// Phone number (unique when present)
    #[sea_orm(unique)]
    pub phone: Option<String>,

    pub first_name: String,

    pub last_name: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub role: UserRole,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Latest issued token pair
    #[sea_orm(has_one = "super::user_token::Entity")]
    Token,
}

impl Related<super::user_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Token.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

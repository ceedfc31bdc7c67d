//! Database entities

pub mod user;
pub mod user_token;

pub use user::Entity as User;
pub use user_token::Entity as UserToken;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user_token::Entity as UserToken;
}

//! SeaORM implementation of [`UserRepository`]

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use sessiongate_auth::models::{normalize_email, normalize_phone};
use sessiongate_auth::{
    Credential, Identity, NewUser, RepositoryError, RequestScope, StoredTokens, UserRecord,
    UserRepository,
};
use tracing::{debug, warn};

use crate::entities::{user, user_token};

/// Users and tokens stored through a SeaORM connection
#[derive(Clone)]
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Latest token pair recorded for `user_id`
    pub async fn tokens_for(&self, user_id: &str) -> Result<Option<StoredTokens>, RepositoryError> {
        let row = user_token::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(|t| StoredTokens {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            updated_at: t.updated_at,
        }))
    }
}

fn map_db_err(err: DbErr) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => return RepositoryError::Duplicate,
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => return RepositoryError::NotFound,
        _ => {}
    }

    match &err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
            warn!("Database unavailable: {}", err);
            RepositoryError::Unavailable(err.to_string())
        }
        _ => RepositoryError::Backend(err.to_string()),
    }
}

fn to_identity(model: user::Model) -> Identity {
    Identity {
        user_id: model.user_id,
        email: model.email,
        first_name: model.first_name,
        last_name: model.last_name,
        phone: model.phone,
        role: model.role.into(),
        created_at: model.created_at,
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_email(
        &self,
        _scope: &RequestScope,
        email: &str,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let row = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(|model| {
            let credential = Credential {
                user_id: model.user_id.clone(),
                password_hash: model.password_hash.clone(),
            };
            UserRecord {
                identity: to_identity(model),
                credential,
            }
        }))
    }

    async fn find_by_id(
        &self,
        _scope: &RequestScope,
        user_id: &str,
    ) -> Result<Option<Identity>, RepositoryError> {
        let row = user::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(to_identity))
    }

    async fn exists_by_email_or_phone(
        &self,
        _scope: &RequestScope,
        email: &str,
        phone: Option<String>,
    ) -> Result<bool, RepositoryError> {
        let condition = Condition::any()
            .add(user::Column::Email.eq(normalize_email(email)))
            .add_option(phone.map(|p| user::Column::Phone.eq(normalize_phone(&p))));

        let count = user::Entity::find()
            .filter(condition)
            .count(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(count > 0)
    }

    async fn insert(&self, _scope: &RequestScope, user: NewUser) -> Result<String, RepositoryError> {
        let NewUser {
            identity,
            password_hash,
            tokens,
        } = user;
        let user_id = identity.user_id.clone();

        let txn = self.db.begin().await.map_err(map_db_err)?;

        user::ActiveModel {
            user_id: Set(identity.user_id),
            email: Set(normalize_email(&identity.email)),
            phone: Set(identity.phone.as_deref().map(normalize_phone)),
            first_name: Set(identity.first_name),
            last_name: Set(identity.last_name),
            password_hash: Set(password_hash),
            role: Set(identity.role.into()),
            created_at: Set(identity.created_at),
            updated_at: Set(identity.created_at),
        }
        .insert(&txn)
        .await
        .map_err(map_db_err)?;

        user_token::ActiveModel {
            user_id: Set(user_id.clone()),
            access_token: Set(tokens.access_token),
            refresh_token: Set(tokens.refresh_token),
            updated_at: Set(tokens.updated_at),
        }
        .insert(&txn)
        .await
        .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        debug!("Inserted user {}", user_id);
        Ok(user_id)
    }

    async fn upsert_tokens(
        &self,
        _scope: &RequestScope,
        user_id: &str,
        tokens: StoredTokens,
    ) -> Result<(), RepositoryError> {
        let row = user_token::ActiveModel {
            user_id: Set(user_id.to_string()),
            access_token: Set(tokens.access_token),
            refresh_token: Set(tokens.refresh_token),
            updated_at: Set(tokens.updated_at),
        };

        user_token::Entity::insert(row)
            .on_conflict(
                OnConflict::column(user_token::Column::UserId)
                    .update_columns([
                        user_token::Column::AccessToken,
                        user_token::Column::RefreshToken,
                        user_token::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }
}

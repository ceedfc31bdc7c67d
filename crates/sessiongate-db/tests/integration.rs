//! Integration tests for sessiongate-db
//!
//! Tests repository operations with real SQLite in-memory database

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectionTrait, EntityTrait};
use sessiongate_auth::{
    AuthConfig, AuthError, AuthService, HasherConfig, Identity, ManualClock, NewUser,
    ProfileFields, RepositoryError, RequestScope, Role, SignupRequest, SigningSecret,
    StoredTokens, UserRepository,
};
use sessiongate_db::{connect, entities::user, migrate, open, SeaOrmUserRepository};

/// Helper to create a migrated test database
async fn setup_repo() -> SeaOrmUserRepository {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    SeaOrmUserRepository::new(db)
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
}

fn scope() -> RequestScope {
    RequestScope::new(Duration::from_secs(5))
}

fn new_user(user_id: &str, email: &str, phone: Option<&str>) -> NewUser {
    NewUser {
        identity: Identity {
            user_id: user_id.to_string(),
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: phone.map(str::to_string),
            role: Role::User,
            created_at: at(9),
        },
        password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".to_string(),
        tokens: StoredTokens {
            access_token: format!("access-{}", user_id),
            refresh_token: format!("refresh-{}", user_id),
            updated_at: at(9),
        },
    }
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let result = migrate(&db).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    migrate(&db).await.expect("first migration run");
    migrate(&db).await.expect("second migration run");
}

#[tokio::test]
async fn test_open_returns_ready_repository() {
    let repo = open("sqlite::memory:").await.expect("Failed to open user store");

    repo.insert(&scope(), new_user("u1", "a@example.com", None))
        .await
        .unwrap();
    assert!(repo.find_by_id(&scope(), "u1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_insert_and_find_user() {
    let repo = setup_repo().await;
    let scope = scope();

    let id = repo
        .insert(&scope, new_user("u1", "ada@example.com", Some("+1 555 0100")))
        .await
        .unwrap();
    assert_eq!(id, "u1");

    let record = repo
        .find_by_email(&scope, "  ADA@Example.com ")
        .await
        .unwrap()
        .expect("user should be found by normalized email");
    assert_eq!(record.identity.user_id, "u1");
    assert_eq!(record.identity.phone.as_deref(), Some("+15550100"));
    assert_eq!(record.identity.created_at, at(9));
    assert_eq!(record.credential.user_id, "u1");
    assert!(record.credential.password_hash.starts_with("$argon2id$"));

    let identity = repo.find_by_id(&scope, "u1").await.unwrap().unwrap();
    assert_eq!(identity, record.identity);

    assert!(repo.find_by_id(&scope, "missing").await.unwrap().is_none());
    assert!(repo
        .find_by_email(&scope, "nobody@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_role_is_stored_upper_case() {
    let repo = setup_repo().await;
    let mut admin = new_user("root", "root@example.com", None);
    admin.identity.role = Role::Admin;
    repo.insert(&scope(), admin).await.unwrap();

    let row = user::Entity::find_by_id("root".to_string())
        .one(repo.connection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.role, user::UserRole::Admin);

    let identity = repo.find_by_id(&scope(), "root").await.unwrap().unwrap();
    assert_eq!(identity.role, Role::Admin);
}

#[tokio::test]
async fn test_insert_stores_initial_tokens() {
    let repo = setup_repo().await;
    repo.insert(&scope(), new_user("u1", "ada@example.com", None))
        .await
        .unwrap();

    let tokens = repo.tokens_for("u1").await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access-u1");
    assert_eq!(tokens.refresh_token, "refresh-u1");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let repo = setup_repo().await;
    repo.insert(&scope(), new_user("u1", "ada@example.com", None))
        .await
        .unwrap();

    let result = repo
        .insert(&scope(), new_user("u2", "ADA@example.com", None))
        .await;
    assert!(matches!(result, Err(RepositoryError::Duplicate)));

    // Failed transaction leaves no token row behind
    assert!(repo.tokens_for("u2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_phone_rejected_but_missing_phones_coexist() {
    let repo = setup_repo().await;
    repo.insert(&scope(), new_user("u1", "a@example.com", Some("5550100")))
        .await
        .unwrap();

    let result = repo
        .insert(&scope(), new_user("u2", "b@example.com", Some("5550100")))
        .await;
    assert!(matches!(result, Err(RepositoryError::Duplicate)));

    repo.insert(&scope(), new_user("u3", "c@example.com", None))
        .await
        .unwrap();
    repo.insert(&scope(), new_user("u4", "d@example.com", None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_phone_in_another_format_is_duplicate() {
    let repo = setup_repo().await;
    let scope = scope();
    repo.insert(&scope, new_user("u1", "a@example.com", Some("+44 20 7946 0000")))
        .await
        .unwrap();

    assert!(repo
        .exists_by_email_or_phone(&scope, "b@example.com", Some("+442079460000".to_string()))
        .await
        .unwrap());

    let result = repo
        .insert(&scope, new_user("u2", "b@example.com", Some("+442079460000")))
        .await;
    assert!(matches!(result, Err(RepositoryError::Duplicate)));
}

#[tokio::test]
async fn test_exists_by_email_or_phone() {
    let repo = setup_repo().await;
    let scope = scope();
    repo.insert(&scope, new_user("u1", "a@example.com", Some("5550100")))
        .await
        .unwrap();

    assert!(repo
        .exists_by_email_or_phone(&scope, "A@example.com", None)
        .await
        .unwrap());
    assert!(repo
        .exists_by_email_or_phone(&scope, "other@example.com", Some("5550100".to_string()))
        .await
        .unwrap());
    assert!(!repo
        .exists_by_email_or_phone(&scope, "other@example.com", Some("5550199".to_string()))
        .await
        .unwrap());
    assert!(!repo
        .exists_by_email_or_phone(&scope, "other@example.com", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_upsert_tokens_replaces_previous_pair() {
    let repo = setup_repo().await;
    let scope = scope();
    repo.insert(&scope, new_user("u1", "a@example.com", None))
        .await
        .unwrap();

    for (n, hour) in [(1, 10), (2, 11)] {
        repo.upsert_tokens(
            &scope,
            "u1",
            StoredTokens {
                access_token: format!("access-{}", n),
                refresh_token: format!("refresh-{}", n),
                updated_at: at(hour),
            },
        )
        .await
        .unwrap();
    }

    let tokens = repo.tokens_for("u1").await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token, "refresh-2");
    assert_eq!(tokens.updated_at, at(11));
}

#[tokio::test]
async fn test_upsert_tokens_for_unknown_user() {
    let repo = setup_repo().await;

    let result = repo
        .upsert_tokens(
            &scope(),
            "ghost",
            StoredTokens {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                updated_at: at(10),
            },
        )
        .await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_auth_service_over_database() {
    let repo = Arc::new(setup_repo().await);
    let clock = Arc::new(ManualClock::new(at(12)));
    let secret = SigningSecret::new(b"db-integration-secret-0123456789".to_vec()).unwrap();
    let config = AuthConfig {
        hasher: HasherConfig::minimal(),
        ..AuthConfig::default()
    };
    let service = AuthService::new(config, &secret, repo.clone(), clock.clone()).unwrap();
    let scope = service.new_scope();

    let signup = service
        .signup(
            &scope,
            SignupRequest {
                password: "secret1".to_string(),
                profile: ProfileFields {
                    email: "Grace@Example.com".to_string(),
                    first_name: "Grace".to_string(),
                    last_name: "Hopper".to_string(),
                    phone: Some("+1 555 0101".to_string()),
                    role: Role::Admin,
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(signup.identity.email, "grace@example.com");

    let duplicate = service
        .signup(
            &scope,
            SignupRequest {
                password: "secret2".to_string(),
                profile: ProfileFields {
                    email: "someone@example.com".to_string(),
                    first_name: "Some".to_string(),
                    last_name: "One".to_string(),
                    phone: Some("+15550101".to_string()),
                    role: Role::User,
                },
            },
        )
        .await;
    assert!(matches!(duplicate, Err(AuthError::AlreadyExists)));

    let login = service
        .login(&scope, "grace@example.com", "secret1")
        .await
        .unwrap();
    let stored = repo.tokens_for(&signup.identity.user_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, login.tokens.access_token.as_str());

    let refreshed = service
        .refresh(&scope, login.tokens.refresh_token.as_str())
        .await
        .unwrap();
    let ctx = service
        .authenticate(Some(refreshed.tokens.access_token.as_str()))
        .unwrap();
    assert_eq!(ctx.role, Role::Admin);
    assert_eq!(ctx.user_id, signup.identity.user_id);
}

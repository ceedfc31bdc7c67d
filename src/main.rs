//! Sessiongate - session authentication server
//!
//! Serves signup, login, token refresh and role-checked user lookups, plus
//! operator helpers. Administrator accounts are only created through
//! `create-user`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sessiongate_api::{ApiServer, ApiServerConfig};
use sessiongate_auth::{
    AuthConfig, AuthService, CredentialHasher, EnvSecretProvider, HasherConfig, Identity,
    InMemoryUserRepository, ProfileFields, Role, SecretProvider, SignupRequest, SigningSecret,
    StaticSecretProvider, SystemClock, TokenCodec, UserRepository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sessiongate - password login and signed session tokens
#[derive(Parser, Debug)]
#[command(name = "sessiongate")]
#[command(about = "Sessiongate - password login and signed session tokens")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "SESSIONGATE_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Database URL (postgres:// or sqlite://). Users are kept in memory when omitted
        #[arg(long, env = "SESSIONGATE_DATABASE_URL")]
        database_url: Option<String>,

        /// Deadline for the storage calls of one request, in seconds
        #[arg(long, env = "SESSIONGATE_REQUEST_TIMEOUT", default_value = "10")]
        request_timeout: u64,

        /// Disable CORS for local development origins
        #[arg(long)]
        no_cors: bool,

        #[command(flatten)]
        tokens: TokenArgs,

        #[command(flatten)]
        hasher: HasherArgs,
    },

    /// Print the Argon2id hash of a password
    HashPassword {
        /// Password to hash. Read from stdin when omitted
        password: Option<String>,

        #[command(flatten)]
        hasher: HasherArgs,
    },

    /// Register a user directly in the database, with any role
    ///
    /// Public signup always creates USER accounts; administrators are made here.
    CreateUser {
        /// Database URL (postgres:// or sqlite://)
        #[arg(long, env = "SESSIONGATE_DATABASE_URL")]
        database_url: String,

        #[arg(long)]
        email: String,

        /// Password for the new account. Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        phone: Option<String>,

        /// USER or ADMIN
        #[arg(long, default_value = "USER")]
        role: Role,

        #[command(flatten)]
        tokens: TokenArgs,

        #[command(flatten)]
        hasher: HasherArgs,
    },

    /// Mint an access/refresh pair for an identity and print it as JSON
    IssueToken {
        /// Subject user id
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// USER or ADMIN
        #[arg(long, default_value = "USER")]
        role: Role,

        #[command(flatten)]
        tokens: TokenArgs,
    },
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// HS256 signing secret
    #[arg(long, env = "SESSIONGATE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Access token lifetime in hours
    #[arg(long, env = "SESSIONGATE_ACCESS_TTL_HOURS", default_value = "24")]
    access_ttl_hours: i64,

    /// Refresh token lifetime in hours
    #[arg(long, env = "SESSIONGATE_REFRESH_TTL_HOURS", default_value = "168")]
    refresh_ttl_hours: i64,
}

#[derive(Args, Debug)]
struct HasherArgs {
    /// Argon2 memory cost in KiB
    #[arg(long, env = "SESSIONGATE_ARGON2_MEMORY_KIB")]
    argon2_memory_kib: Option<u32>,

    /// Argon2 iteration count
    #[arg(long, env = "SESSIONGATE_ARGON2_ITERATIONS")]
    argon2_iterations: Option<u32>,

    /// Argon2 lanes
    #[arg(long, env = "SESSIONGATE_ARGON2_PARALLELISM")]
    argon2_parallelism: Option<u32>,
}

impl HasherArgs {
    fn config(&self) -> HasherConfig {
        let defaults = HasherConfig::default();
        HasherConfig {
            memory_kib: self.argon2_memory_kib.unwrap_or(defaults.memory_kib),
            iterations: self.argon2_iterations.unwrap_or(defaults.iterations),
            parallelism: self.argon2_parallelism.unwrap_or(defaults.parallelism),
        }
    }
}

impl TokenArgs {
    fn signing_secret(&self) -> Result<SigningSecret> {
        let secret = match &self.secret {
            Some(secret) => StaticSecretProvider::new(Some(secret.as_str())).signing_secret(),
            None => EnvSecretProvider::default().signing_secret(),
        };
        secret.context("A signing secret is required (--secret or SESSIONGATE_SECRET)")
    }

    fn ttls(&self) -> Result<(chrono::Duration, chrono::Duration)> {
        Ok((
            ttl_hours("--access-ttl-hours", self.access_ttl_hours)?,
            ttl_hours("--refresh-ttl-hours", self.refresh_ttl_hours)?,
        ))
    }
}

fn ttl_hours(flag: &str, hours: i64) -> Result<chrono::Duration> {
    if hours <= 0 {
        anyhow::bail!("{} must be positive, got {}", flag, hours);
    }
    let ttl = chrono::Duration::try_hours(hours)
        .with_context(|| format!("{} is out of range: {}", flag, hours))?;
    if chrono::Utc::now().checked_add_signed(ttl).is_none() {
        anyhow::bail!("{} is too large: {}", flag, hours);
    }
    Ok(ttl)
}

fn read_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn open_repository(database_url: Option<&str>) -> Result<Arc<dyn UserRepository>> {
    match database_url {
        Some(url) => {
            let repository = sessiongate_db::open(url)
                .await
                .context("Failed to open user database")?;
            Ok(Arc::new(repository))
        }
        None => {
            warn!("No database configured, users are kept in memory and lost on exit");
            Ok(Arc::new(InMemoryUserRepository::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            database_url,
            request_timeout,
            no_cors,
            tokens,
            hasher,
        } => {
            info!("Sessiongate starting...");

            let secret = tokens.signing_secret()?;
            let (access_ttl, refresh_ttl) = tokens.ttls()?;
            let config = AuthConfig {
                access_ttl,
                refresh_ttl,
                hasher: hasher.config(),
                repository_timeout: Duration::from_secs(request_timeout),
            };

            let repository = open_repository(database_url.as_deref()).await?;
            let service = AuthService::new(config, &secret, repository, Arc::new(SystemClock))
                .context("Failed to initialize authentication service")?;

            let server = ApiServer::new(
                ApiServerConfig {
                    bind_addr: bind,
                    enable_cors: !no_cors,
                },
                Arc::new(service),
            );
            server.start().await?;
        }

        Commands::HashPassword { password, hasher } => {
            let password = read_password(password)?;

            let hasher =
                CredentialHasher::new(hasher.config()).context("Invalid Argon2 parameters")?;
            let hash = hasher.hash(&password).context("Failed to hash password")?;
            println!("{}", hash);
        }

        Commands::CreateUser {
            database_url,
            email,
            password,
            first_name,
            last_name,
            phone,
            role,
            tokens,
            hasher,
        } => {
            let secret = tokens.signing_secret()?;
            let (access_ttl, refresh_ttl) = tokens.ttls()?;
            let config = AuthConfig {
                access_ttl,
                refresh_ttl,
                hasher: hasher.config(),
                ..AuthConfig::default()
            };

            let repository = open_repository(Some(&database_url)).await?;
            let service = AuthService::new(config, &secret, repository, Arc::new(SystemClock))
                .context("Failed to initialize authentication service")?;

            let request = SignupRequest {
                password: read_password(password)?,
                profile: ProfileFields {
                    email,
                    first_name,
                    last_name,
                    phone,
                    role,
                },
            };
            let scope = service.new_scope();
            let session = service
                .signup(&scope, request)
                .await
                .context("Failed to create user")?;

            info!(
                "Created {} account {} for {}",
                session.identity.role, session.identity.user_id, session.identity.email
            );
            println!("{}", serde_json::to_string_pretty(&session.identity)?);
        }

        Commands::IssueToken {
            user_id,
            email,
            first_name,
            last_name,
            role,
            tokens,
        } => {
            let secret = tokens.signing_secret()?;
            let (access_ttl, refresh_ttl) = tokens.ttls()?;
            let codec =
                TokenCodec::new(&secret, Arc::new(SystemClock)).with_ttls(access_ttl, refresh_ttl);

            let identity = Identity {
                user_id,
                email,
                first_name,
                last_name,
                phone: None,
                role,
                created_at: codec.now(),
            };
            let pair = codec
                .issue_pair(&identity)
                .context("Failed to sign token pair")?;

            let output = serde_json::json!({
                "user_id": identity.user_id,
                "access_token": pair.access_token.as_str(),
                "refresh_token": pair.refresh_token.as_str(),
                "access_expires_at": pair.access_expires_at,
                "refresh_expires_at": pair.refresh_expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

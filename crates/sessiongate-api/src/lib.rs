pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use sessiongate_auth::AuthService;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<AuthService>,
}

impl AppState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sessiongate API",
        version = "0.1.0",
        description = "Signup, login, token refresh and role-checked user access",
        contact(
            name = "Sessiongate Team",
            email = "team@sessiongate.dev"
        )
    ),
    paths(
        handlers::health_check,
        handlers::signup,
        handlers::login,
        handlers::refresh,
        handlers::get_current_user,
        handlers::get_user,
    ),
    components(
        schemas(
            models::UserRole,
            models::HealthResponse,
            models::ErrorResponse,
            models::SignupRequest,
            models::LoginRequest,
            models::RefreshRequest,
            models::User,
            models::SessionResponse,
            models::CurrentUser,
        )
    ),
    tags(
        (name = "auth", description = "Signup, login and token endpoints"),
        (name = "users", description = "User lookup endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS for local development origins
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, service: Arc<AuthService>) -> Self {
        let state = Arc::new(AppState::new(service));
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        // Build PUBLIC routes (no authentication required)
        let public_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/auth/signup", post(handlers::signup))
            .route("/api/auth/login", post(handlers::login))
            .route("/api/auth/refresh", post(handlers::refresh))
            .with_state(self.state.clone());

        // Build PROTECTED routes (require a valid access token)
        let protected_router = Router::new()
            .route("/api/auth/me", get(handlers::get_current_user))
            .route("/api/users/{user_id}", get(handlers::get_user))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::require_auth,
            ));

        let mut router = public_router
            .merge(protected_router)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            use tower_http::cors::AllowOrigin;

            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(middleware::TOKEN_HEADER),
                ])
                .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                    // Allow common development origins
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                        || origin_str.starts_with("https://localhost:")
                        || origin_str.starts_with("https://127.0.0.1:")
                }));

            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI document: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        info!("API server stopped");
        Ok(())
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

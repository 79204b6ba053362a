/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use orgdesk_api::{app::AppState, config::Config};
/// use orgdesk_shared::auth::middleware::TokenVerifier;
/// use orgdesk_shared::db::{pool::{create_pool, DatabaseConfig}, PgExecutor};
/// use orgdesk_shared::events::BroadcastEventSink;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let verifier = TokenVerifier::jwks(config.token_settings());
/// let state = AppState::new(
///     Arc::new(PgExecutor::new(pool)),
///     Arc::new(BroadcastEventSink::new(256)),
///     verifier,
///     config,
/// );
/// let app = orgdesk_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use orgdesk_shared::{
    auth::middleware::{create_auth_middleware, TokenVerifier},
    db::QueryExecutor,
    events::EventSink,
    models::user::UserRepository,
    services::{OrganizationService, OrganizationUserService, UserService},
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Everything inside is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Statement executor shared by every repository
    pub db: Arc<dyn QueryExecutor>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Bearer token verification
    pub verifier: TokenVerifier,

    pub users: UserService,
    pub organizations: OrganizationService,
    pub organization_users: OrganizationUserService,
}

impl AppState {
    /// Creates new application state, wiring services to `db` and `events`
    pub fn new(
        db: Arc<dyn QueryExecutor>,
        events: Arc<dyn EventSink>,
        verifier: TokenVerifier,
        config: Config,
    ) -> Self {
        Self {
            users: UserService::new(db.clone(), events.clone()),
            organizations: OrganizationService::new(db.clone(), events.clone()),
            organization_users: OrganizationUserService::new(db.clone(), events),
            db,
            config: Arc::new(config),
            verifier,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                              # Health check (public)
/// └── /v1/
///     ├── /users/
///     │   ├── POST   /                     # Register (public)
///     │   ├── GET    /check-email          # Email availability (public)
///     │   ├── GET    /check-username       # Username availability (public)
///     │   ├── GET    /:id                  # Fetch user
///     │   ├── PATCH  /:id                  # Update profile (owner)
///     │   ├── PATCH  /:id/email            # Change email (owner)
///     │   ├── PATCH  /:id/notifications    # Notification settings (owner)
///     │   └── PATCH  /:id/verify           # Mark verified (owner)
///     └── /organizations/
///         ├── POST   /                     # Create
///         ├── GET    /                     # List the caller's organizations
///         ├── GET    /:org_id              # Fetch (member)
///         ├── PATCH  /:org_id              # Update (admin)
///         ├── GET    /:org_id/users        # List members (member)
///         └── POST   /:org_id/users        # Add member by email (admin)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Bearer authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth = middleware::from_fn(create_auth_middleware(
        state.verifier.clone(),
        UserRepository::new(state.db.clone()),
    ));

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Registration and availability checks (public)
    let public_user_routes = Router::new()
        .route("/", post(routes::users::register))
        .route("/check-email", get(routes::users::check_email))
        .route("/check-username", get(routes::users::check_username));

    let user_routes = Router::new()
        .route(
            "/:id",
            get(routes::users::get_user).patch(routes::users::update_profile),
        )
        .route("/:id/email", patch(routes::users::update_email))
        .route("/:id/notifications", patch(routes::users::update_notifications))
        .route("/:id/verify", patch(routes::users::verify))
        .layer(auth.clone());

    let organization_routes = Router::new()
        .route(
            "/",
            get(routes::organizations::list_organizations)
                .post(routes::organizations::create_organization),
        )
        .route(
            "/:org_id",
            get(routes::organizations::get_organization)
                .patch(routes::organizations::update_organization),
        )
        .route(
            "/:org_id/users",
            get(routes::organizations::list_members).post(routes::organizations::add_member),
        )
        .layer(auth);

    let v1_routes = Router::new()
        .nest("/users", public_user_routes.merge(user_routes))
        .nest("/organizations", organization_routes);

    let cors = if state.config.allows_any_origin() {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

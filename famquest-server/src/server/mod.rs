mod acl;
pub mod access;
pub mod auth;
mod config;
pub mod provision;
pub mod tutor;

use std::sync::Arc;

use crate::identity::{IdentityError, IdentityStore, NewIdentity};
use crate::server::auth::AuthCtx;
use crate::storage::models::{Profile, ProfileChanges};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{Method, StatusCode, header},
    routing::{delete, get, post},
};
use bcrypt::verify;
pub use config::{AppConfig, TutorConfig};
use famquest_shared::api;
use famquest_shared::auth::Role;
use famquest_shared::domain::Feature;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: crate::storage::Store,
    pub identity: Arc<dyn IdentityStore>,
    tutor: tutor::TutorService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: crate::storage::Store,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        let tutor = tutor::TutorService::from_config(&config.tutor);
        Self {
            config,
            store,
            identity,
            tutor,
        }
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route("/api/v1/auth/logout", post(api_auth_logout))
        .route(
            "/api/v1/profile",
            get(api_get_profile).post(api_update_profile),
        )
        .route("/api/v1/access", get(api_my_access))
        .route(
            "/api/v1/children",
            get(api_list_children).post(api_create_child),
        )
        .route("/api/v1/children/{id}", delete(api_detach_child))
        .route(
            "/api/v1/children/{id}/credentials",
            post(api_rotate_credentials),
        )
        .route(
            "/api/v1/children/{id}/access",
            get(api_get_child_access).put(api_set_child_access),
        )
        .route(
            "/api/v1/settings/api-key",
            get(api_get_api_key).put(api_put_api_key),
        )
        .route("/api/v1/tutor", post(api_tutor))
        .with_state(state.clone())
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            identity_id = tracing::field::Empty,
            username = tracing::field::Empty,
            role = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/auth/signup", post(api_auth_signup))
        .route("/api/v1/auth/login", post(api_auth_login))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured

    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    // Put into request extensions for trace layer & handlers
    req.extensions_mut().insert(ReqId(rid.clone()));
    // Call next
    let mut resp = next.run(req).await;
    // Set header on response
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    // General security headers for all responses
    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    // HSTS is only honored on HTTPS; harmless otherwise
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    // Disable caching for API and health endpoints
    if path == "/healthz" || path.starts_with("/api/") || path == "/api" {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
        headers.insert(
            HeaderName::from_static("expires"),
            HeaderValue::from_static("0"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("identity_id", tracing::field::display(&auth.claims.sub));
        span.record("username", tracing::field::display(&auth.claims.username));
        span.record("role", tracing::field::debug(&auth.claims.role));
    }
    Ok(next.run(req).await)
}

// Auth handlers

async fn api_auth_signup(
    State(state): State<AppState>,
    Json(body): Json<api::SignupReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if body.username.trim().is_empty() {
        return Err(AppError::bad_request("username is required"));
    }
    if body.password.len() < 8 {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    // Parents never carry an age group
    let age_group = match body.role {
        Role::Parent => None,
        Role::Child => body.age_group,
    };

    let identity = state
        .identity
        .create_identity(NewIdentity {
            email: body.email.trim(),
            password: &body.password,
            display_name: body.username.trim(),
            role: body.role,
            age_group: age_group.map(|g| g.as_str()),
            email_verified: true,
        })
        .await
        .map_err(|e| match e {
            IdentityError::EmailTaken => AppError::conflict("email already registered"),
            other => AppError::upstream(format!("identity creation failed: {other}")),
        })?;

    ensure_profile_for_identity(&state, &identity).await?;

    let token = auth::issue_jwt_for_identity(&state, &identity).await?;
    Ok(Json(api::AuthResp { token }))
}

async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::AuthReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    let identity = state
        .identity
        .get_identity_by_email(body.email.trim())
        .await
        .map_err(|e| AppError::upstream(format!("identity lookup failed: {e}")))?
        .ok_or_else(|| {
            tracing::warn!(email=%body.email, "login: unknown email");
            AppError::unauthorized()
        })?;
    if !verify(&body.password, &identity.password_hash).map_err(|e| {
        tracing::error!(identity_id=%identity.id, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(identity_id=%identity.id, "login: invalid password");
        return Err(AppError::unauthorized());
    }

    // First successful login creates the profile row from identity metadata.
    ensure_profile_for_identity(&state, &identity).await?;

    let token = auth::issue_jwt_for_identity(&state, &identity).await?;
    Ok(Json(api::AuthResp { token }))
}

async fn api_auth_logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_session(&auth.claims.jti)
        .await
        .map_err(AppError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_profile_for_identity(
    state: &AppState,
    identity: &crate::identity::Identity,
) -> Result<(), AppError> {
    state
        .store
        .insert_profile_if_absent(
            &identity.id,
            &identity.display_name,
            identity.role.as_str(),
            identity.age_group.as_deref(),
        )
        .await
        .map_err(AppError::internal)?;
    Ok(())
}

// Profile handlers

async fn api_get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::ProfileDto>, AppError> {
    let profile = state
        .store
        .get_profile(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    Ok(Json(profile_dto(&profile)))
}

async fn api_update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::ProfileUpdateReq>,
) -> Result<Json<api::ProfileDto>, AppError> {
    if auth.claims.role == Role::Parent && body.age_group.is_some() {
        return Err(AppError::bad_request("parents do not have an age group"));
    }
    if let Some(name) = &body.username
        && name.trim().is_empty()
    {
        return Err(AppError::bad_request("username cannot be empty"));
    }
    let changes = ProfileChanges {
        username: body.username,
        age_group: body.age_group.map(|g| g.as_str().to_string()),
        avatar_url: body.avatar_url,
    };
    let profile = state
        .store
        .update_profile(&auth.claims.sub, changes)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    Ok(Json(profile_dto(&profile)))
}

// Family handlers

async fn api_create_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::CreateChildReq>,
) -> Result<Json<api::CreateChildResp>, AppError> {
    // A parent may only provision under their own id.
    if body.parent_id != auth.claims.sub {
        tracing::warn!(
            claimed = %body.parent_id,
            actual = %auth.claims.sub,
            "create child: parent_id mismatch"
        );
        return Err(AppError::forbidden());
    }
    if body.username.trim().is_empty() {
        return Err(AppError::bad_request("username is required"));
    }

    let profile = provision::provision_child(
        state.identity.as_ref(),
        &state.store,
        provision::ProvisionRequest {
            parent_id: auth.claims.sub.clone(),
            display_name: body.username.trim().to_string(),
            age_group: body.age_group,
            existing_child_id: body.child_id,
        },
    )
    .await?;

    Ok(Json(api::CreateChildResp {
        child_profile: profile_dto(&profile),
    }))
}

async fn api_list_children(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<api::ProfileDto>>, AppError> {
    let rows = state
        .store
        .list_children(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?;
    let items = rows.iter().map(profile_dto).collect();
    Ok(Json(items))
}

async fn api_detach_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let link = state
        .store
        .get_link_by_child(&id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("no family link for child: {}", id)))?;
    if link.parent_id != auth.claims.sub {
        tracing::warn!(child_id=%id, "detach: caller does not own the link");
        return Err(AppError::forbidden());
    }
    // Pure detach: the child's profile, settings and data all survive.
    state
        .store
        .delete_link(link.id)
        .await
        .map_err(AppError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn api_rotate_credentials(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::RotateCredentialsReq>,
) -> Result<Json<api::RotateCredentialsResp>, AppError> {
    let creds = provision::rotate_credentials(
        state.identity.as_ref(),
        &state.store,
        &auth.claims.sub,
        &id,
        body.username,
    )
    .await?;
    Ok(Json(api::RotateCredentialsResp {
        credentials: api::CredentialsDto {
            email: creds.email,
            password: creds.password,
            username: creds.username,
        },
    }))
}

// Access handlers

async fn api_my_access(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::AccessDto>, AppError> {
    if auth.claims.role == Role::Parent {
        // Parents are never gated.
        return Ok(Json(access::to_dto(None)));
    }
    let dto = access::resolve_child_access(&state.store, &auth.claims.sub)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(dto))
}

async fn api_get_child_access(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::AccessDto>, AppError> {
    require_linked(&state, &auth.claims.sub, &id).await?;
    let dto = access::resolve_child_access(&state.store, &id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(dto))
}

async fn api_set_child_access(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::SetAccessReq>,
) -> Result<Json<api::AccessDto>, AppError> {
    require_linked(&state, &auth.claims.sub, &id).await?;
    let row = state
        .store
        .set_access(&id, body.feature, body.allowed)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(access::to_dto(Some(&row))))
}

async fn require_linked(state: &AppState, parent: &str, child: &str) -> Result<(), AppError> {
    let linked = state
        .store
        .is_linked(parent, child)
        .await
        .map_err(AppError::internal)?;
    if !linked {
        tracing::warn!(child_id=%child, "access: caller is not the linked parent");
        return Err(AppError::forbidden());
    }
    Ok(())
}

// Parent settings handlers

async fn api_get_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::ApiKeyDto>, AppError> {
    // Display-to-owner only; the ACL restricts this route to parents and the
    // lookup is keyed by the caller's own id.
    let settings = state
        .store
        .get_parent_settings(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::ApiKeyDto {
        api_key: settings.and_then(|s| s.provider_api_key),
    }))
}

async fn api_put_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::ApiKeyReq>,
) -> Result<StatusCode, AppError> {
    let key = body.api_key.trim();
    if key.is_empty() {
        return Err(AppError::bad_request("api_key cannot be empty"));
    }
    state
        .store
        .set_provider_key(&auth.claims.sub, key)
        .await
        .map_err(AppError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// Tutor proxy

async fn api_tutor(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::TutorReq>,
) -> Result<Json<api::TutorResp>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::bad_request("message is required"));
    }
    let profile = state
        .store
        .get_profile(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::unauthorized())?;
    let role = profile.role();

    if role == Role::Child {
        let settings = state
            .store
            .get_access_settings(&profile.id)
            .await
            .map_err(AppError::internal)?;
        if !access::has_access(role, settings.as_ref(), Feature::Tutors) {
            tracing::warn!(child_id=%profile.id, "tutor: feature disabled for child");
            return Err(AppError::forbidden());
        }
    }

    let resolved = match role {
        // A parent may bring their own key (e.g. while configuring it).
        Role::Parent => match &body.api_key {
            Some(k) if !k.trim().is_empty() => Some(k.clone()),
            _ => tutor::resolve_provider_key(&state.store, &profile)
                .await
                .map_err(AppError::internal)?,
        },
        // A child-supplied key is never accepted; resolution always walks
        // the family link server-side.
        Role::Child => tutor::resolve_provider_key(&state.store, &profile)
            .await
            .map_err(AppError::internal)?,
    };
    let Some(key) = resolved else {
        return Err(AppError::MissingKey);
    };

    let age_group = body
        .age_group
        .map(|g| g.as_str().to_string())
        .or_else(|| profile.age_group.clone())
        .unwrap_or_else(|| "all ages".to_string());

    let response = state
        .tutor
        .ask(&key, &body.subject, &age_group, &body.message)
        .await?;
    Ok(Json(api::TutorResp { response }))
}

fn profile_dto(p: &Profile) -> api::ProfileDto {
    api::ProfileDto {
        id: p.id.clone(),
        username: p.username.clone(),
        role: p.role(),
        age_group: p.age_group.as_deref().and_then(|s| s.parse().ok()),
        avatar_url: p.avatar_url.clone(),
        created_at: to_rfc3339(p.created_at),
        updated_at: to_rfc3339(p.updated_at),
    }
}

fn to_rfc3339(dt: chrono::NaiveDateTime) -> String {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(dt, chrono::Utc).to_rfc3339()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    /// Identity store or relational store unreachable; safe to retry.
    UpstreamUnavailable(String),
    /// Saga compensation failed; an operator must finish the cleanup.
    OrphanRisk {
        orphan_id: String,
        detail: String,
    },
    MissingKey,
    InvalidKey,
    RateLimited,
    Provider(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn conflict<T: Into<String>>(msg: T) -> Self {
        Self::Conflict(msg.into())
    }
    fn upstream<T: Into<String>>(msg: T) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<provision::ProvisionError> for AppError {
    fn from(e: provision::ProvisionError) -> Self {
        use provision::ProvisionError;
        match e {
            ProvisionError::IdentityCreation(IdentityError::EmailTaken) => {
                AppError::conflict("login identifier already taken, retry the request")
            }
            ProvisionError::IdentityCreation(IdentityError::NotFound) => {
                AppError::not_found("child identity not found")
            }
            err @ ProvisionError::IdentityCreation(_) => AppError::upstream(err.to_string()),
            err @ ProvisionError::ProfileProvisioning { .. } => AppError::upstream(err.to_string()),
            ProvisionError::FamilyLink {
                identity_id,
                source,
            } => {
                let msg = format!(
                    "child identity created but family link failed, id={identity_id}: {source}"
                );
                match source {
                    crate::storage::StorageError::Conflict(_) => AppError::Conflict(msg),
                    _ => AppError::UpstreamUnavailable(msg),
                }
            }
            ProvisionError::OrphanRisk { orphan_id, detail } => {
                AppError::OrphanRisk { orphan_id, detail }
            }
        }
    }
}

impl From<provision::RotationError> for AppError {
    fn from(e: provision::RotationError) -> Self {
        use provision::RotationError;
        match e {
            RotationError::NotAuthorized => AppError::forbidden(),
            RotationError::IdentityNotFound => AppError::not_found("child identity not found"),
            RotationError::Failed(detail) => AppError::upstream(detail),
        }
    }
}

impl From<tutor::TutorError> for AppError {
    fn from(e: tutor::TutorError) -> Self {
        match e {
            tutor::TutorError::InvalidKey => AppError::InvalidKey,
            tutor::TutorError::RateLimited => AppError::RateLimited,
            tutor::TutorError::Provider(detail) => AppError::Provider(detail),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "not authorized".into(),
                "not_authorized",
                None,
            ),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            AppError::UpstreamUnavailable(m) => (
                StatusCode::SERVICE_UNAVAILABLE,
                m,
                "upstream_unavailable",
                None,
            ),
            AppError::OrphanRisk { orphan_id, detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "cleanup failed, orphaned child identity id={}; operator intervention required",
                    orphan_id
                ),
                "orphan_risk",
                Some(detail),
            ),
            AppError::MissingKey => (
                StatusCode::BAD_REQUEST,
                "AI provider key not configured. Add one in parent settings.".into(),
                "missing_key",
                None,
            ),
            AppError::InvalidKey => (
                StatusCode::BAD_REQUEST,
                "The configured AI provider key was rejected. Check it in parent settings.".into(),
                "invalid_key",
                None,
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "AI provider rate limit reached. Wait a moment and try again.".into(),
                "rate_limited",
                None,
            ),
            // Provider-internal error text stays in the log
            AppError::Provider(m) => (
                StatusCode::BAD_GATEWAY,
                "The AI provider could not answer right now. Try again later.".into(),
                "provider_error",
                Some(m),
            ),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        // Log any error responses at ERROR level for troubleshooting
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody {
            error: msg,
            kind: kind.to_string(),
        });
        (status, body).into_response()
    }
}

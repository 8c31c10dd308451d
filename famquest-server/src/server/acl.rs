use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use famquest_shared::auth::Role;

/// Role/route access control. Runs after `require_bearer`; ownership checks
/// that need the family link (linked parent, own child) live in the handlers
/// because links are data, not token claims.
pub async fn enforce_acl(
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let segs = segmented(&path);
    let prefix = ["api", "v1"];
    if !segs.as_slice().starts_with(&prefix) {
        tracing::warn!(?segs, "ACL: path outside API scope");
        return Err(AppError::forbidden());
    }
    let rest = &segs[prefix.len()..];

    let decision = match claims.role {
        Role::Parent => allow_parent(&method, rest),
        Role::Child => allow_child(&method, rest),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            identity_id = %claims.sub,
            role = ?claims.role,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn allow_parent(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["auth", "logout"] if *method == Method::POST => Ok(()),
        ["profile"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["access"] if *method == Method::GET => Ok(()),
        ["children"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["children", _] if *method == Method::DELETE => Ok(()),
        ["children", _, "credentials"] if *method == Method::POST => Ok(()),
        ["children", _, "access"] if *method == Method::GET || *method == Method::PUT => Ok(()),
        ["settings", "api-key"] if *method == Method::GET || *method == Method::PUT => Ok(()),
        ["tutor"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn allow_child(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["auth", "logout"] if *method == Method::POST => Ok(()),
        ["profile"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["access"] if *method == Method::GET => Ok(()),
        ["tutor"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

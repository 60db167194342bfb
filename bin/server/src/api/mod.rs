use axum::{
  Router,
  http::{HeaderName, HeaderValue},
  middleware,
  routing::get,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{auth::auth_request, config::cors_layer};

mod actors;
mod datasets;
mod kv;
mod queues;
mod runs;

/// Root router: per-resource nests, a `/version` probe, CORS, and a
/// fixed set of security headers layered over everything. There is no
/// static frontend to fall back to — the browser UI is an external
/// collaborator served from somewhere else
/// entirely.
pub fn app() -> Router {
  let authenticated = Router::new()
    .merge(actors::router())
    .merge(runs::router())
    .merge(datasets::router())
    .merge(kv::router())
    .merge(queues::router())
    .layer(middleware::from_fn(auth_request));

  Router::new()
    .route("/health", get(health))
    .route("/version", get(|| async { env!("CARGO_PKG_VERSION") }))
    .nest("/v2", authenticated)
    .layer(TraceLayer::new_for_http())
    .layer(cors_layer())
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-content-type-options"),
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-frame-options"),
      HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("referrer-policy"),
      HeaderValue::from_static("strict-origin-when-cross-origin"),
    ))
}

/// Liveness/readiness probe: the process has no business being "up" if it
/// can't reach either datastore, so this is the one endpoint that
/// actually exercises both rather than just returning 200 unconditionally.
async fn health() -> axum::response::Response {
  use axum::http::StatusCode;
  use axum::response::IntoResponse;

  let db_ok = crate::state::db_client().ping().await.is_ok();
  let coordination_ok = crate::state::coordination().ping().await.is_ok();

  if db_ok && coordination_ok {
    (StatusCode::OK, "ok").into_response()
  } else {
    (
      StatusCode::SERVICE_UNAVAILABLE,
      format!("database_ok={db_ok} coordination_ok={coordination_ok}"),
    )
      .into_response()
  }
}

/// Shared ownership check used by every handler that mutates or reads a
/// principal-scoped resource. Authorization *policy* stays external; this
/// is just the identity check the core itself is responsible for
/// (`Authorizer::is_authorized`, `crates/common`).
pub(crate) fn require_owner(
  principal: &crawlhub_common::entities::principal::Principal,
  owner_id: &str,
) -> Result<(), crawlhub_common::ApiError> {
  use crawlhub_common::entities::principal::{Authorizer, OwnerOnlyAuthorizer};
  if OwnerOnlyAuthorizer.is_authorized(principal, owner_id) {
    Ok(())
  } else {
    Err(crawlhub_common::ApiError::Unauthorized(
      "principal does not own this resource".to_string(),
    ))
  }
}

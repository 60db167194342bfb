use axum::{
  extract::Request,
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use crawlhub_common::{ApiError, entities::principal::Principal};

const API_KEY_PREFIX: &str = "cp_";

/// The user-management surface stays external: the core only consumes an
/// opaque `Principal` and an is-this-call-authorized check.
/// This resolver is the seam a real deployment wires a user-management
/// service into; it only distinguishes the two *kinds* of bearer token
/// the wire contract names (short-lived session token vs. `cp_`-prefixed
/// API key) without validating either against a user store, mirroring
/// how `ContainerRuntime`/`BlobStore` are traits with a minimal default
/// implementation rather than hardwired to one backend.
pub trait PrincipalResolver: Send + Sync {
  fn resolve(&self, token: &str) -> Result<Principal, ApiError>;
}

pub struct OpaqueTokenResolver;

impl PrincipalResolver for OpaqueTokenResolver {
  fn resolve(&self, token: &str) -> Result<Principal, ApiError> {
    if token.is_empty() {
      return Err(ApiError::Unauthenticated("missing bearer token".to_string()));
    }
    let is_api_key = token.starts_with(API_KEY_PREFIX);
    Ok(Principal::new(token.to_string(), is_api_key))
  }
}

fn bearer_header_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
}

/// `GET /actor-runs/:id/logs/stream` is consumed from plain browser
/// `EventSource` connections, which cannot set an `Authorization` header
/// and needs a `token=` query parameter for browser contexts, so that one
/// route also accepts the token that way.
fn query_token(req: &Request) -> Option<String> {
  let query = req.uri().query()?;
  serde_qs::from_str::<std::collections::HashMap<String, String>>(query)
    .ok()?
    .remove("token")
}

/// `axum::middleware::from_fn` handler: resolves a `Principal`
/// from the request and inserts it into extensions for downstream
/// handlers to pull out via `Extension<Principal>`.
pub async fn auth_request(
  headers: HeaderMap,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let token = match bearer_header_token(&headers) {
    Some(token) => token.to_string(),
    None => query_token(&req).ok_or_else(|| {
      ApiError::Unauthenticated("missing bearer token".to_string())
    })?,
  };
  let principal = OpaqueTokenResolver.resolve(&token)?;
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}

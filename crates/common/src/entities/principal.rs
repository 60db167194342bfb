use serde::{Deserialize, Serialize};

/// An authenticated identity, opaque to the core. The user-management
/// surface (registration, password hashing, API-key issuance) is an
/// external collaborator; this crate only needs enough shape to route
/// ownership and authorization decisions through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
  pub id: String,
  /// True when the call was authenticated with a long-lived API key
  /// (`cp_`-prefixed token) rather than a short-lived session token.
  pub is_api_key: bool,
}

impl Principal {
  pub fn new(id: impl Into<String>, is_api_key: bool) -> Self {
    Principal {
      id: id.into(),
      is_api_key,
    }
  }
}

/// Authorization contract consumed by the core: given a principal and a
/// resource owner, decide whether the call is allowed. The core never
/// implements policy itself, only calls through this.
pub trait Authorizer: Send + Sync {
  fn is_authorized(&self, principal: &Principal, owner_id: &str) -> bool;
}

/// The trivial authorizer: a principal may only act on resources it owns.
/// Suitable as the default collaborator implementation and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerOnlyAuthorizer;

impl Authorizer for OwnerOnlyAuthorizer {
  fn is_authorized(&self, principal: &Principal, owner_id: &str) -> bool {
    principal.id == owner_id
  }
}

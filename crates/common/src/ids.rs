use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of every opaque id handed out at the wire boundary.
///
/// Matches the source platform's id shape so that SDKs written against
/// that wire contract don't notice the difference.
pub const ID_LENGTH: usize = 21;

/// The literal alias clients may pass instead of a real storage handle id.
/// Resolved per-principal to that principal's default store of the given
/// kind, creating one lazily if none exists yet.
pub const DEFAULT_ALIAS: &str = "default";

/// Generates a fresh opaque id using the same uniform alphanumeric alphabet
/// as the rest of the wire-visible ids.
pub fn generate_id() -> String {
  rand::rng()
    .sample_iter(&Alphanumeric)
    .take(ID_LENGTH)
    .map(char::from)
    .collect()
}

/// Generates a short-lived opaque token (used for the per-run container
/// token and similar ephemeral credentials). Longer than an entity id since
/// it doubles as a bearer secret.
pub fn generate_token(len: usize) -> String {
  rand::rng()
    .sample_iter(&Alphanumeric)
    .take(len)
    .map(char::from)
    .collect()
}

pub fn is_default_alias(id: &str) -> bool {
  id == DEFAULT_ALIAS
}

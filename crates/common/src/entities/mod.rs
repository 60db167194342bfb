pub mod actor;
pub mod dataset;
pub mod kv;
pub mod log;
pub mod principal;
pub mod queue;
pub mod run;

pub use actor::*;
pub use dataset::*;
pub use kv::*;
pub use log::*;
pub use principal::*;
pub use queue::*;
pub use run::*;

/// Current Unix time in milliseconds. Centralized so every `created_at` /
/// `updated_at` stamp in the system is generated the same way.
pub fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

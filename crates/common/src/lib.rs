pub mod entities;
pub mod error;
pub mod ids;

pub use entities::*;
pub use error::{ApiError, ApiResult, DataEnvelope};

pub mod client;
pub mod locks;
pub mod logs;
pub mod notify;
pub mod queue_index;

pub use client::Coordination;

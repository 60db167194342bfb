pub mod client;
pub mod helpers;
pub mod queues;
pub mod runs;

pub use client::{Client, DatabaseConfig};

pub use mongodb;
pub use mongodb::bson;

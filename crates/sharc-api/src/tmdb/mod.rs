pub mod client;
pub mod error;
pub mod types;

pub use client::{ImageSize, TmdbClient, TmdbOptions};
pub use error::TmdbError;

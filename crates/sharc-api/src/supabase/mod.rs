pub mod auth;
pub mod error;
pub mod table;
pub mod types;

pub use auth::SupabaseAuth;
pub use error::SupabaseError;
pub use table::SupabaseTable;
pub use types::SupabaseOptions;

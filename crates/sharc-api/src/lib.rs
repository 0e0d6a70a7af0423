pub mod supabase;
pub mod tmdb;
pub mod traits;

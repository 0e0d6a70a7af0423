mod movie;
mod watchlist;

pub use movie::*;
pub use watchlist::*;

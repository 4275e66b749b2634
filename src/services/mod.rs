pub mod accounts;
pub mod catalog;
pub mod passwords;
pub mod providers;
pub mod recommendations;
pub mod seed;
pub mod tokens;
pub mod watchlist;

pub use tokens::{Claims, TokenService};

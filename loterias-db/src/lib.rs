pub mod bets;
pub mod db;
pub mod models;

pub use rusqlite;

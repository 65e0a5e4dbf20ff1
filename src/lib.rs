pub mod acquisition;
pub mod catalogue;
pub mod config;
pub mod errors;
pub mod models;
pub mod tiles;
pub mod utils;

pub mod aggregate;
pub mod backend;
pub mod calculator;
pub mod export;
pub mod ingredient_cache;
pub mod models;
pub mod profile;
pub mod session;

pub mod approval;
pub mod config;
pub mod db;
pub mod editing;
pub mod error;
pub mod handlers;
pub mod lines;
pub mod models;
pub mod stores;

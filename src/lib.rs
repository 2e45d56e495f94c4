pub mod config;
pub mod db;
pub mod itunes;
pub mod pathmeta;
pub mod push;
pub mod reconcile;
pub mod server;
pub mod web;

/// Application name for XDG paths
pub const APP_NAME: &str = "tunelink";

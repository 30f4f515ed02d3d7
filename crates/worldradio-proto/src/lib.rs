pub mod cache;
pub mod config;
pub mod directory;
pub mod favorites;
pub mod model;
pub mod platform;
pub mod settings;

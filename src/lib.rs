pub mod artifacts;
pub mod config;
pub mod detector;
pub mod error;
pub mod render;
pub mod routes;
pub mod summary;
pub mod upload;
pub mod yolo;

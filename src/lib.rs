pub mod config;
pub mod controllers;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{AppError, Result};

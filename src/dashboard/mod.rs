pub mod aggregate;
pub mod dto;
mod handlers;
pub mod repo;
pub mod services;

pub use handlers::router;

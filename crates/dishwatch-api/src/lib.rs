pub mod auth;
pub mod error;
pub mod menu;
pub mod middleware;
pub mod reports;
pub mod session;

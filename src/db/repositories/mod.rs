pub mod auth;
pub mod rows;

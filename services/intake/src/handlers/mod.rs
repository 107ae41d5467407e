pub mod admin;
pub mod code;
pub mod evaluation;
pub mod health;

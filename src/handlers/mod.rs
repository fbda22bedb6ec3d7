// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod content;
pub mod quiz;
pub mod reports;
pub mod weeks;

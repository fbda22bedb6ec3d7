// src/models/mod.rs

pub mod batch;
pub mod content;
pub mod quiz;
pub mod report;
pub mod user;
pub mod week;

// src/services/mod.rs

pub mod gating;
pub mod generator;

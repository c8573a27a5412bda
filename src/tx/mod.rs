// src/tx/mod.rs

pub mod builder;

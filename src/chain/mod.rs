// src/chain/mod.rs

pub mod address;
pub mod client;
pub mod erc20;
pub mod units;

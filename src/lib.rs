// src/lib.rs

//! Lottery draw archive library.
//!
//! Fetches weekly draw results round by round, verifies the latest round,
//! and keeps a local snapshot so repeated runs avoid refetching.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;

//! Core library: device identity, photo records, sync client and grid model.

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod grid;
pub mod identity;
pub mod models;
pub mod sync;

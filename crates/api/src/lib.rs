//! T-Shirt Studio API library.
//!
//! This crate provides the HTTP service as a library, allowing it to be
//! tested with stub providers and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod middleware;
pub mod printify;
pub mod providers;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;

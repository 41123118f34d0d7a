//! casegate - Authentication and access-control gate for a case-management API
//!
//! This crate decides, per request, whether the caller is who their bearer
//! token says, whether that login is still live, and whether the account may
//! do what it asks. Tokens are signed and stateless; sessions and rate
//! counters live in a shared cache so logout and throttling hold across
//! instances.

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod notify;
pub mod server;
pub mod telemetry;

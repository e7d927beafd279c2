//! Shared library surface for the navigation server and its tests.

pub mod api;
pub mod backoff;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod road_client;
pub mod state;

//! Spy cat agency service.
//!
//! Tracks spy cats, the missions they run, and the targets inside each mission.
//! The domain rules live in [`models`]; [`db`] persists them and runs every
//! operation as a single SQLite transaction; [`api`] exposes the operations over
//! HTTP.

pub mod api;
pub mod breeds;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};

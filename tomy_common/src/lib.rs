//! Tomy Common Library
//!
//! This crate provides shared constants and configuration loading utilities
//! for all tomy workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Ring buffer sizes, record limits and default resource keys
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use tomy_common::consts::RINGBUFFER_SIZE;
//! use tomy_common::config::{ConfigLoader, FrameConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;

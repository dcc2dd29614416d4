#![forbid(unsafe_code)]

//! Cached lookup layer between the story front end and the YouTube Data API.
//!
//! The binary in `src/bin/backend.rs` exposes these modules over HTTP; the
//! library itself never binds a socket.

pub mod cache;
pub mod config;
pub mod error;
pub mod lookup;
pub mod upstream;
pub mod video;

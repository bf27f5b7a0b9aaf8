//! Operation binding, routing cache, and pipelines for Nodepack.
//!
//! This crate provides:
//! - [`Operation`] - Declares requirements against a [`Request`], then executes over nodes
//! - [`Column`] - Typed column binding handed to an operation
//! - [`DirectRouter`] and [`CacheRouter`] - Hash every lookup, or record and replay a [`Route`]
//! - [`RunTarget`] - `try_run` / `run` entry points for every chunk shape
//! - [`Pipeline`] - Ordered operations with a per-structure match cache
//! - [`EngineConfig`] - Replay validation and routing trace switches

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod column;
mod config;
mod operation;
mod pipeline;
mod request;
mod route;
mod router;
mod runner;

pub use column::Column;
pub use config::EngineConfig;
pub use operation::Operation;
pub use pipeline::{CachedStage, Pipeline, Stage};
pub use request::{BindRequest, MatchRequest, OffsetRequest, Request};
pub use route::{RecordRequest, ReplayRequest, Route, RouteStep};
pub use router::{CacheRouter, DirectRouter, Router, RouterStats};
pub use runner::{RunTarget, dispatch};

//! Task pipelines
//!
//! A [`Builder`] collects named steps; [`Builder::build`] freezes them into a
//! [`Task`] that runs the steps strictly in order. Steps fan out over hosts
//! with [`parallel::run_bounded`], which honours the concurrency budget of the
//! [`Context`](crate::context::Context).

pub mod builder;
pub mod parallel;

pub use builder::{Builder, FuncStep, Step, Task};
pub use parallel::run_bounded;

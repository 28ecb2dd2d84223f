#![forbid(unsafe_code)]

//! Lifeline demo application.
//!
//! # Role in Lifeline
//! `lifeline-demo` rebuilds a small component-based UI on top of the runtime
//! so both patterns can be watched side by side: views that let their
//! subscriptions dangle, and views whose subscriptions end with them.
//!
//! # How it fits in the system
//! - [`user_service`]: simulated HTTP user lookup as a one-shot source.
//! - [`view`] and [`views`]: the view contract and the four views.
//! - [`app`]: router that creates and destroys views.
//! - [`scenario`]: scripted runs in virtual time, producing a report.
//! - [`cli`] and [`logging`]: binary plumbing.

pub mod app;
pub mod cli;
pub mod logging;
pub mod scenario;
pub mod user_service;
pub mod view;
pub mod views;

//! InfluxDB sink for the impression engine.

pub mod client;
pub mod config;
pub mod health;
pub mod line_protocol;
pub mod sink;

pub use client::*;
pub use config::*;
pub use sink::{InfluxSink, PointSink};

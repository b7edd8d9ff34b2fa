//! weakscale-core: Configuration model for weak-scaling inference benchmarks
//!
//! This crate provides the types shared by the weakscale tools:
//! - Ensemble task tables and the weak-scaling ensemble builder
//! - System topology and launcher backend records
//! - Inference endpoint addressing
//! - Error handling

pub mod artifact;
pub mod endpoint;
pub mod ensemble;
pub mod error;
pub mod topology;

pub use endpoint::*;
pub use ensemble::*;
pub use error::*;
pub use topology::*;

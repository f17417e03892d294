//! Query-side types consumed by sealed segments.

pub mod plan;

pub use plan::{Plan, PlanBuilder, QueryInfo};

//! Telemetry helpers: completion cost estimation.
//!
//! Costs are advisory only. They feed log lines, never control flow, so
//! an unknown model simply yields no estimate.

mod pricing;

pub use pricing::{estimate_completion_cost_usd, ModelPricing};

//! Portfolio risk-tilt services
//!
//! Each service owns its rolling state behind one lock and converts internal
//! failures into its fail-closed (or, for breadth, neutral) answer.

pub mod breadth;
pub mod correlation;
pub mod rolling;
pub mod tilt;
pub mod vol_of_vol;

pub use breadth::{BreadthMetrics, BreadthReallocationService};
pub use correlation::CorrelationCapService;
pub use tilt::{RiskTiltEngine, SizedOrder};
pub use vol_of_vol::{VolOfVolAdjustment, VolOfVolGuardService};

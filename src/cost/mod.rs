//! Cost estimation for plans.
//!
//! This module maps the sizing attributes declared on plan actions to
//! monthly cost estimates, using fixed-point decimal arithmetic so that
//! sums of many line items never drift.

mod estimate;
mod factors;
mod model;
mod rates;

pub use estimate::{CostEstimate, LineItem, CAVEATS};
pub use factors::{CostFactors, MAX_SIZING_VALUE};
pub use model::CostModel;
pub use rates::{RateCard, ServiceKind, StorageRates, HOURS_PER_MONTH};

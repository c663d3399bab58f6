//! Shared data structures for the profile pipeline and order fulfillment
//!
//! - `birth`: BirthMoment, PersonInput, GeoFix (pipeline inputs)
//! - `result`: ComputationResult, StageFailure, StageName (pipeline output)
//! - `order`: Order, OrderStatus, ProductTier (fulfillment entity)

mod birth;
mod result;
mod order;

pub use birth::*;
pub use result::*;
pub use order::*;

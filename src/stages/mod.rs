//! Computation stages
//!
//! Each stage is a function returning `Result<_, StageError>`. Lookups are
//! pure; the frame and classifier stages also query the ephemeris engine.
//!
//! | Stage | Module | Needs |
//! |---|---|---|
//! | numeric reducer | [`numerology`] | raw date string |
//! | sign translator | [`signs`] | engine sign code |
//! | tropical / sidereal frames | [`frames`] | ephemeris |
//! | element resolver | [`elements`] | sidereal Sun sign |
//! | decan resolver | [`decans`] | sidereal Sun sign + degree, decan table |
//! | gate/channel/center classifier | [`bodygraph`] | ephemeris, channel table |

pub mod bodygraph;
pub mod decans;
pub mod elements;
pub mod frames;
pub mod numerology;
pub mod signs;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

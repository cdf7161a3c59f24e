//! Long-only safety net.
//!
//! Direction is fixed to long when a candidate is built and `NewOrder` has no
//! direction field at all. This is the second lock: a hard check right
//! before a request leaves for the broker.

use tracing::error;

use crate::domain::Direction;
use crate::error::{GovexError, Result};

/// Directions accepted from callers. Anything other than long is refused.
pub fn parse_requested_direction(raw: Option<&str>) -> Result<Direction> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Direction::Long),
        Some(s) if s.eq_ignore_ascii_case("long") => Ok(Direction::Long),
        Some(other) => Err(GovexError::Validation(format!(
            "direction '{other}' is not allowed; the engine is long-only"
        ))),
    }
}

/// Final check before broker submission.
///
/// A failure here means an upstream layer produced a non-long candidate. It
/// is logged at the highest severity and the caller must stop submitting for
/// the rest of the tick.
pub fn enforce_long_only(direction: Direction, pair: &str, units: i64) -> Result<()> {
    if direction == Direction::Long && units > 0 {
        return Ok(());
    }
    error!(
        %direction,
        pair,
        units,
        "LONG-ONLY SAFETY NET BREACHED: refusing broker submission"
    );
    Err(GovexError::DirectionViolation(format!(
        "{direction} {units} {pair} reached the submission layer"
    )))
}

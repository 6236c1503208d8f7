//! Meter level conversion helpers
//!
//! The metering engine works in linear amplitude; presentation layers
//! convert to decibels on read. Exact zero is distinguished from "very
//! quiet" so a UI can render a true-silence state instead of the floor.

/// Display floor for meter readouts, in dBFS
pub const METER_FLOOR_DB: f32 = -60.0;

/// Convert a linear amplitude to decibels for display.
///
/// Returns `None` for exact zero (the silence sentinel). Non-zero values
/// are converted with `20 * log10` and floored at [`METER_FLOOR_DB`].
/// Negative or non-finite inputs are treated as silence.
pub fn linear_to_db(linear: f32) -> Option<f32> {
    if !linear.is_finite() || linear <= 0.0 {
        return None;
    }
    Some((20.0 * linear.log10()).max(METER_FLOOR_DB))
}

/// Convert decibels back to linear amplitude
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

//! Exposition format implementations.

use std::fmt::Write;

pub mod text;

/// Content type of the Prometheus text exposition format written by
/// [`text::encode`].
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// 2^53, the largest magnitude below which every integral f64 is exact.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Writes a sample value the way Prometheus parsers expect it.
///
/// Integral values are written without a fractional part, everything else in
/// the shortest representation that round-trips.
pub(crate) fn encode_value<W: Write>(writer: &mut W, v: f64) -> Result<(), std::fmt::Error> {
    if v.is_nan() {
        return writer.write_str("NaN");
    }
    if v.is_infinite() {
        return writer.write_str(if v > 0.0 { "+Inf" } else { "-Inf" });
    }
    if v.fract() == 0.0 && v.abs() <= EXACT_INTEGER_LIMIT {
        return writer.write_str(itoa::Buffer::new().format(v as i64));
    }
    writer.write_str(dtoa::Buffer::new().format(v))
}

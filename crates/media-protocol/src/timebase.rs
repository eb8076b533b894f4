//! Rational track timebases and tick/microsecond conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Error type for timebase construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimebaseError {
    /// Numerator or denominator was zero
    #[error("Timebase component must be non-zero: {num}/{den}")]
    ZeroComponent {
        /// Rejected numerator
        num: u32,
        /// Rejected denominator
        den: u32,
    },
}

/// How tick <-> microsecond conversions are computed.
///
/// `Float` scales through `f64` factors and truncates, which drifts by up to
/// one unit per conversion. `Exact` multiplies before dividing in `i128` and
/// rounds to nearest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimebaseConversion {
    /// `f64` scale factors, truncated toward zero
    Float,
    /// Integer multiply-then-divide, rounded to nearest
    #[default]
    Exact,
}

impl TimebaseConversion {
    /// Returns the conversion mode as a string for logs and config.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TimebaseConversion::Float => "float",
            TimebaseConversion::Exact => "exact",
        }
    }
}

/// A rational timebase: one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Timebase {
    num: u32,
    den: u32,
}

impl Timebase {
    /// 90 kHz clock used by MPEG-TS and RTP video.
    pub const MPEG_TS: Self = Self { num: 1, den: 90_000 };

    /// Millisecond clock used by RTMP/FLV.
    pub const RTMP: Self = Self { num: 1, den: 1_000 };

    /// Create a timebase of `num / den` seconds per tick.
    ///
    /// # Errors
    ///
    /// Returns `TimebaseError::ZeroComponent` if either component is zero.
    pub const fn new(num: u32, den: u32) -> Result<Self, TimebaseError> {
        if num == 0 || den == 0 {
            return Err(TimebaseError::ZeroComponent { num, den });
        }
        Ok(Self { num, den })
    }

    /// Numerator (seconds side)
    #[must_use]
    pub const fn num(&self) -> u32 {
        self.num
    }

    /// Denominator (ticks side)
    #[must_use]
    pub const fn den(&self) -> u32 {
        self.den
    }

    /// Seconds per tick as a scalar.
    #[must_use]
    pub fn expr(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Ticks per second as a scalar.
    #[must_use]
    pub fn timescale(&self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a tick count in this timebase to microseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn ticks_to_micros(&self, ticks: i64, mode: TimebaseConversion) -> i64 {
        match mode {
            TimebaseConversion::Float => (ticks as f64 * (self.expr() * 1_000_000.0)) as i64,
            TimebaseConversion::Exact => div_round(
                i128::from(ticks) * i128::from(self.num) * i128::from(MICROS_PER_SECOND),
                i128::from(self.den),
            ),
        }
    }

    /// Convert microseconds to a tick count in this timebase.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn micros_to_ticks(&self, micros: i64, mode: TimebaseConversion) -> i64 {
        match mode {
            TimebaseConversion::Float => (micros as f64 * (self.timescale() / 1_000_000.0)) as i64,
            TimebaseConversion::Exact => div_round(
                i128::from(micros) * i128::from(self.den),
                i128::from(self.num) * i128::from(MICROS_PER_SECOND),
            ),
        }
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Divide rounding half away from zero, saturating to the `i64` range.
/// `den` is always positive here.
fn div_round(numer: i128, den: i128) -> i64 {
    let quotient = numer / den;
    let remainder = numer % den;
    let rounded = if remainder.abs() * 2 >= den {
        quotient + numer.signum()
    } else {
        quotient
    };
    i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_components() {
        assert_eq!(
            Timebase::new(0, 90_000),
            Err(TimebaseError::ZeroComponent { num: 0, den: 90_000 })
        );
        assert!(Timebase::new(1, 0).is_err());
        assert_eq!(Timebase::new(1, 90_000).unwrap(), Timebase::MPEG_TS);
    }

    #[test]
    fn test_scalars() {
        assert!((Timebase::RTMP.timescale() - 1000.0).abs() < f64::EPSILON);
        assert!((Timebase::RTMP.expr() - 0.001).abs() < f64::EPSILON);
        assert_eq!(Timebase::MPEG_TS.to_string(), "1/90000");
    }

    #[test]
    fn test_exact_round_trip_is_lossless_at_90khz() {
        let tb = Timebase::MPEG_TS;
        for ticks in [0_i64, 1, 1000, 2999, 90_000, 8_589_934_591, -450] {
            let micros = tb.ticks_to_micros(ticks, TimebaseConversion::Exact);
            assert_eq!(tb.micros_to_ticks(micros, TimebaseConversion::Exact), ticks);
        }
    }

    #[test]
    fn test_float_truncates() {
        let tb = Timebase::MPEG_TS;
        let micros = tb.ticks_to_micros(1000, TimebaseConversion::Float);
        assert_eq!(micros, 11_111);
        // 11_111 us is 999.99 ticks, truncated
        assert_eq!(tb.micros_to_ticks(micros, TimebaseConversion::Float), 999);
    }

    #[test]
    fn test_exact_rounds_to_nearest() {
        let tb = Timebase::MPEG_TS;
        assert_eq!(tb.ticks_to_micros(1000, TimebaseConversion::Exact), 11_111);
        assert_eq!(tb.micros_to_ticks(11_111, TimebaseConversion::Exact), 1000);
        assert_eq!(tb.ticks_to_micros(-1000, TimebaseConversion::Exact), -11_111);
        // 1/3 ms ticks: 1 tick = 333.33 us, 2 ticks = 666.67 us
        let tb = Timebase::new(1, 3_000).unwrap();
        assert_eq!(tb.ticks_to_micros(1, TimebaseConversion::Exact), 333);
        assert_eq!(tb.ticks_to_micros(2, TimebaseConversion::Exact), 667);
    }

    #[test]
    fn test_exact_saturates() {
        let tb = Timebase::new(u32::MAX, 1).unwrap();
        assert_eq!(
            tb.ticks_to_micros(i64::MAX, TimebaseConversion::Exact),
            i64::MAX
        );
        assert_eq!(
            tb.ticks_to_micros(i64::MIN, TimebaseConversion::Exact),
            i64::MIN
        );
    }

    #[test]
    fn test_conversion_serde_lowercase() {
        let mode: TimebaseConversion = serde_json::from_str("\"float\"").unwrap();
        assert_eq!(mode, TimebaseConversion::Float);
        assert_eq!(TimebaseConversion::default(), TimebaseConversion::Exact);
        assert_eq!(TimebaseConversion::Exact.as_str(), "exact");
    }
}

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

// ---------------------------------------------------------------------------
// GenTime
// ---------------------------------------------------------------------------

/// A position or duration on the timeline, in seconds.
///
/// The frame rate is never stored on the value; it is supplied to each
/// conversion. Two values closer than [`GenTime::DELTA`] compare equal, so
/// times that reach the same frame through different rounding paths match.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenTime(f64);

impl GenTime {
    pub const ZERO: Self = Self(0.0);

    /// Comparison tolerance in seconds. Well below one frame at any
    /// supported rate.
    pub const DELTA: f64 = 0.00001;

    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn from_frames(frames: i64, fps: f64) -> Self {
        Self(frames as f64 / fps)
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }

    pub fn ms(&self) -> f64 {
        self.0 * 1000.0
    }

    /// Nearest frame index at `fps`.
    pub fn frames(&self, fps: f64) -> i64 {
        (self.0 * fps + 0.5).floor() as i64
    }

    /// True when both values land on the same frame at `fps`.
    pub fn same_frame(&self, other: GenTime, fps: f64) -> bool {
        self.frames(fps) == other.frames(fps)
    }

    pub fn is_zero(&self) -> bool {
        self.0.abs() < Self::DELTA
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    pub fn min(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }
}

impl PartialEq for GenTime {
    fn eq(&self, other: &Self) -> bool {
        (self.0 - other.0).abs() < Self::DELTA
    }
}

impl PartialOrd for GenTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else {
            self.0.partial_cmp(&other.0)
        }
    }
}

impl Add for GenTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for GenTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for GenTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<f64> for GenTime {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for GenTime {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}

impl AddAssign for GenTime {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for GenTime {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for GenTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = (self.0.abs() * 1000.0).round() as u64;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0.0 && total_ms > 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

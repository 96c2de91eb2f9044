use serde::{Deserialize, Serialize};

/// Fixed atomic unit scale: 10^-QTY_SCALE is the smallest stored fraction.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Deserialize, Serialize,
)]
pub struct Qty {
    /// number of atomic units (atomic unit = 10^-QTY_SCALE)
    pub units: i64,
}

impl Qty {
    /// number of decimal places of the atomic unit
    pub const QTY_SCALE: i32 = 8;
    pub const ZERO: Self = Self { units: 0 };

    /// Lossy: convert qty to f32, may lose precision beyond `QTY_SCALE`.
    /// Scaling happens in f64 so whole-lot sizes keep exact atomic units.
    pub fn to_f32(self) -> f32 {
        let scale = 10f64.powi(Self::QTY_SCALE);
        ((self.units as f64) / scale) as f32
    }

    /// Lossy: create Qty from f32 (rounds to nearest atomic unit)
    pub fn from_f32(v: f32) -> Self {
        let scale = 10f64.powi(Self::QTY_SCALE);
        let units = (f64::from(v) * scale).round() as i64;
        Self { units }
    }

    pub const fn from_units(units: i64) -> Self {
        Self { units }
    }

    pub fn is_zero(self) -> bool {
        self.units == 0
    }

    pub fn max(self, other: Self) -> Self {
        if self.units >= other.units { self } else { other }
    }

    /// Absolute difference between two quantities.
    pub fn abs_diff(self, other: Self) -> Self {
        if self.units >= other.units {
            self - other
        } else {
            other - self
        }
    }

    /// Guards scale/denominator values against zero-ish inputs.
    pub fn scale_or_one(v: f32) -> f32 {
        if v <= f32::EPSILON { 1.0 } else { v }
    }
}

impl From<Qty> for f32 {
    fn from(qty: Qty) -> f32 {
        qty.to_f32()
    }
}

impl std::ops::Add for Qty {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            units: self
                .units
                .checked_add(rhs.units)
                .expect("Qty add overflowed"),
        }
    }
}

impl std::ops::AddAssign for Qty {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Qty {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            units: self
                .units
                .checked_sub(rhs.units)
                .expect("Qty sub overflowed"),
        }
    }
}

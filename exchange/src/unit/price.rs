use serde::{Deserialize, Serialize};

/// Fixed atomic unit scale: 10^-PRICE_SCALE is the smallest stored fraction.
/// Keeping prices in integer atomic units makes step-rounding exact, so two
/// ticks that land inside the same price level always produce the same cell
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub struct Price {
    /// number of atomic units (atomic unit = 10^-PRICE_SCALE)
    pub units: i64,
}

impl Price {
    /// number of decimal places of the atomic unit (10^-8)
    pub const PRICE_SCALE: i32 = 8;

    pub const ZERO: Self = Self { units: 0 };

    /// Lossy: convert price to f32, may lose precision beyond `PRICE_SCALE`.
    /// Scaling happens in f64 so the atomic units stay exact for any value
    /// an f32 can name.
    pub fn to_f32(self) -> f32 {
        let scale = 10f64.powi(Self::PRICE_SCALE);
        ((self.units as f64) / scale) as f32
    }

    /// Lossy: create Price from f32 (rounds to nearest atomic unit)
    pub fn from_f32(v: f32) -> Self {
        let scale = 10f64.powi(Self::PRICE_SCALE);
        let units = (f64::from(v) * scale).round() as i64;
        Self { units }
    }

    /// Create Price from raw atomic units (no rounding)
    pub const fn from_units(units: i64) -> Self {
        Self { units }
    }

    /// Create Price from an integer scaled by 10^scale_pow10, e.g. the
    /// gateway's paise-denominated wire prices use `from_scaled(v, 2)`.
    pub fn from_scaled(value: i64, scale_pow10: u32) -> Self {
        let exp = Self::PRICE_SCALE as u32 - scale_pow10;
        Self {
            units: value
                .checked_mul(10i64.pow(exp))
                .expect("Price::from_scaled overflowed"),
        }
    }

    /// Round to the nearest multiple of a step.
    /// Ties (exactly half a step) round up to the higher multiple.
    pub fn round_to_step(self, step: PriceStep) -> Self {
        let unit = step.units;
        if unit <= 1 {
            return self;
        }
        let half = unit / 2;
        let rounded = ((self.units + half).div_euclid(unit)) * unit;
        Self { units: rounded }
    }

    /// Floor to multiple of an arbitrary step
    pub fn floor_to_step(self, step: PriceStep) -> Self {
        let unit = step.units;
        if unit <= 1 {
            return self;
        }
        let floored = (self.units.div_euclid(unit)) * unit;
        Self { units: floored }
    }

    /// Ceil to multiple of an arbitrary step
    pub fn ceil_to_step(self, step: PriceStep) -> Self {
        let unit = step.units;
        if unit <= 1 {
            return self;
        }
        let added = self.units.checked_add(unit - 1).unwrap_or_else(|| {
            if self.units.is_negative() {
                i64::MIN
            } else {
                i64::MAX
            }
        });

        let ceiled = (added.div_euclid(unit)) * unit;
        Self { units: ceiled }
    }

    pub fn add_steps(self, steps: i64, step: PriceStep) -> Self {
        Self::from_units(
            self.units
                .checked_add(steps.saturating_mul(step.units))
                .expect("add_steps overflowed"),
        )
    }

    /// Number of step increments between low..=high (inclusive), or None if invalid.
    pub fn steps_between_inclusive(low: Price, high: Price, step: PriceStep) -> Option<usize> {
        if high.units < low.units || step.units <= 0 {
            return None;
        }
        let span = high.units.checked_sub(low.units)?;
        Some((span / step.units) as usize + 1)
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            units: self
                .units
                .checked_add(rhs.units)
                .expect("Price add overflowed"),
        }
    }
}

impl std::ops::Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            units: self
                .units
                .checked_sub(rhs.units)
                .expect("Price sub overflowed"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PriceStep {
    /// step size in atomic units (10^-PRICE_SCALE)
    pub units: i64,
}

impl PriceStep {
    pub fn to_f32(self) -> f32 {
        let scale = 10f64.powi(Price::PRICE_SCALE);
        ((self.units as f64) / scale) as f32
    }

    pub fn from_f32(step: f32) -> Self {
        assert!(step > 0.0, "step must be > 0");
        let scale = 10f64.powi(Price::PRICE_SCALE);
        let units = (f64::from(step) * scale).round() as i64;
        assert!(units > 0, "step too small at given PRICE_SCALE");
        Self { units }
    }

    /// Coarser grouping step: the instrument tick size times a user-selected
    /// multiplier, used for merging price levels into larger cells.
    pub fn multiplied(self, multiplier: u16) -> Self {
        Self {
            units: self
                .units
                .checked_mul(i64::from(multiplier.max(1)))
                .expect("PriceStep::multiplied overflowed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_step_snaps_sub_tick_prices() {
        let step = PriceStep::from_f32(0.05);

        let a = Price::from_f32(100.02).round_to_step(step);
        let b = Price::from_f32(100.04).round_to_step(step);
        let c = Price::from_f32(100.07).round_to_step(step);

        // snapped values sit exactly on step multiples
        assert_eq!(a.units % step.units, 0);
        assert_eq!(b.units % step.units, 0);

        assert_eq!(a, Price::from_f32(100.00));
        // 100.04 and 100.07 land in the same 100.05 cell
        assert_eq!(b, c);
        assert!((b.to_f32() - 100.05).abs() < 1e-4);
    }

    #[test]
    fn round_to_step_ties_go_up() {
        let step = PriceStep::from_f32(0.10);
        // exactly halfway between 99.90 and 100.00
        let p = Price::from_units(9_995_000_000).round_to_step(step);

        assert_eq!(p, Price::from_f32(100.00));
    }

    #[test]
    fn from_scaled_reads_back_as_the_decimal() {
        // 12345 paise == 123.45
        assert!((Price::from_scaled(12_345, 2).to_f32() - 123.45).abs() < 1e-4);
        assert_eq!(Price::from_scaled(12_345, 2).units, 12_345_000_000);
    }

    #[test]
    fn steps_between_counts_inclusive_levels() {
        let step = PriceStep::from_f32(0.5);
        let low = Price::from_f32(100.0);
        let high = Price::from_f32(102.0);

        assert_eq!(Price::steps_between_inclusive(low, high, step), Some(5));
        assert_eq!(Price::steps_between_inclusive(high, low, step), None);
    }
}

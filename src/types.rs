use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("stock exhausted: no bars left to cut a {piece}mm piece")]
    StockExhausted { piece: f64 },
    #[error("no available bar can hold a {piece}mm piece (longest available: {longest}mm)")]
    NoCompatibleBar { piece: f64, longest: f64 },
    #[error("no catalog length can hold a {piece}mm piece (longest in catalog: {longest}mm)")]
    UnsatisfiableRequirement { piece: f64, longest: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    pub length: f64,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub qty: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBar {
    pub length: f64,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub qty: u32,
}

// JSON clients send quantities as either 4 or 4.0; accept both.
fn deserialize_u32_from_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

/// A single bar being cut. `remaining` is working capacity while packing
/// runs and the final waste (offcut) once it completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub length: f64,
    pub cuts: Vec<f64>,
    pub remaining: f64,
}

impl Bar {
    pub fn new(length: f64) -> Self {
        Self {
            length,
            cuts: Vec::new(),
            remaining: length,
        }
    }

    pub fn fits(&self, piece: f64) -> bool {
        piece <= self.remaining
    }

    pub fn assign(&mut self, piece: f64, kerf: f64) {
        self.cuts.push(piece);
        // The blade only consumes material that exists: a piece landing
        // within one kerf of the end leaves zero, not negative, capacity.
        self.remaining = (self.remaining - piece - kerf).max(0.0);
    }

    pub fn waste(&self) -> f64 {
        self.remaining
    }

    pub fn cut_count(&self) -> usize {
        self.cuts.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    /// Bars to purchase as (length, count), longest first.
    pub demand: Vec<(f64, u32)>,
    pub bars: Vec<Bar>,
    pub bar_count: usize,
    pub total_waste: f64,
    /// Per-bar offcuts, longest first.
    pub offcuts: Vec<f64>,
    pub total_cost: Option<f64>,
}

pub fn total_waste(bars: &[Bar]) -> f64 {
    bars.iter().map(|b| b.waste()).sum()
}

pub fn waste_percent(bars: &[Bar]) -> f64 {
    let total_length: f64 = bars.iter().map(|b| b.length).sum();
    if total_length == 0.0 {
        return 0.0;
    }
    total_waste(bars) / total_length * 100.0
}

pub fn cost_of(costs: &[(f64, f64)], length: f64) -> f64 {
    costs
        .iter()
        .find(|(l, _)| *l == length)
        .map(|(_, c)| *c)
        .unwrap_or(0.0)
}

/// Full purchase price of every bar used.
pub fn total_cost(bars: &[Bar], costs: &[(f64, f64)]) -> f64 {
    bars.iter().map(|b| cost_of(costs, b.length)).sum()
}

/// Price of the material actually consumed: each bar's unit cost prorated
/// over its used length.
pub fn effective_cost(bars: &[Bar], costs: &[(f64, f64)]) -> f64 {
    bars.iter()
        .map(|b| {
            if b.length == 0.0 {
                return 0.0;
            }
            let per_mm = cost_of(costs, b.length) / b.length;
            per_mm * (b.length - b.waste())
        })
        .sum()
}

pub(crate) fn check_demands(demands: &[Demand]) -> Result<()> {
    for d in demands {
        if !d.length.is_finite() || d.length <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "piece length must be positive, got {}",
                d.length
            )));
        }
        if d.qty == 0 {
            return Err(Error::InvalidInput(format!(
                "piece quantity must be non-zero for length {}",
                d.length
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_kerf(kerf: f64) -> Result<()> {
    if !kerf.is_finite() || kerf < 0.0 {
        return Err(Error::InvalidInput(format!(
            "kerf must be non-negative, got {}",
            kerf
        )));
    }
    Ok(())
}

pub fn check_costs(costs: &[(f64, f64)]) -> Result<()> {
    for &(length, price) in costs {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidInput(format!(
                "cost must be non-negative for length {}, got {}",
                length, price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_bar_and_used_material_cost() {
        let mut bar = Bar::new(3000.0);
        bar.assign(1000.0, 0.0);
        bar.assign(1500.0, 0.0);
        // An unpriced length contributes nothing to either figure
        let mut spare = Bar::new(2000.0);
        spare.assign(2000.0, 0.0);
        let bars = [bar, spare];
        let costs = [(3000.0, 30.0)];
        assert_eq!(total_cost(&bars, &costs), 30.0);
        // 2500 of 3000mm consumed at 30 per bar
        assert_eq!(effective_cost(&bars, &costs), 25.0);
    }

    #[test]
    fn test_check_costs_rejects_negative_price() {
        assert!(check_costs(&[(3000.0, 12.5)]).is_ok());
        assert!(check_costs(&[]).is_ok());
        let err = check_costs(&[(3000.0, -5.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(check_costs(&[(3000.0, f64::NAN)]).is_err());
    }
}

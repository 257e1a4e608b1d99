//! Portfolio ledger: balances, accrued borrow interest and valuation.

use super::error::{checked_div, GymError};

/// Holdings of one risk asset and the cash (fiat) unit.
///
/// Either balance may be negative, meaning it is borrowed. Interest on the
/// borrowed side is charged per tick through [`PortfolioLedger::accrue_interest`].
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLedger {
    pub asset: f64,
    pub fiat: f64,
    pub interest_asset: f64,
    pub interest_fiat: f64,
}

/// Non-negative view of a ledger as recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioDistribution {
    pub asset: f64,
    pub fiat: f64,
    pub borrowed_asset: f64,
    pub borrowed_fiat: f64,
    pub interest_asset: f64,
    pub interest_fiat: f64,
}

impl PortfolioDistribution {
    pub const FIELDS: [&'static str; 6] = [
        "asset",
        "fiat",
        "borrowed_asset",
        "borrowed_fiat",
        "interest_asset",
        "interest_fiat",
    ];

    pub fn field(&self, index: usize) -> f64 {
        match index {
            0 => self.asset,
            1 => self.fiat,
            2 => self.borrowed_asset,
            3 => self.borrowed_fiat,
            4 => self.interest_asset,
            _ => self.interest_fiat,
        }
    }
}

impl PortfolioLedger {
    pub fn new(asset: f64, fiat: f64) -> Self {
        PortfolioLedger {
            asset,
            fiat,
            interest_asset: 0.0,
            interest_fiat: 0.0,
        }
    }

    /// Ledger worth `value` at `price` with exposure `position`.
    pub fn with_target(position: f64, value: f64, price: f64) -> Result<Self, GymError> {
        let asset = checked_div(position * value, price, "initial asset balance")?;
        Ok(PortfolioLedger::new(asset, (1.0 - position) * value))
    }

    pub fn valuation(&self, price: f64) -> f64 {
        self.asset * price + self.fiat - self.interest_asset * price - self.interest_fiat
    }

    pub fn position(&self, price: f64) -> Result<f64, GymError> {
        checked_div(self.asset * price, self.valuation(price), "position")
    }

    /// Exposure net of the asset interest owed.
    pub fn real_position(&self, price: f64) -> Result<f64, GymError> {
        checked_div(
            (self.asset - self.interest_asset) * price,
            self.valuation(price),
            "real position",
        )
    }

    /// Sets this tick's interest charge on every borrowed balance.
    pub fn accrue_interest(&mut self, rate: f64) {
        self.interest_asset = (-self.asset).max(0.0) * rate;
        self.interest_fiat = (-self.fiat).max(0.0) * rate;
    }

    pub fn distribution(&self) -> PortfolioDistribution {
        PortfolioDistribution {
            asset: self.asset.max(0.0),
            fiat: self.fiat.max(0.0),
            borrowed_asset: (-self.asset).max(0.0),
            borrowed_fiat: (-self.fiat).max(0.0),
            interest_asset: self.interest_asset,
            interest_fiat: self.interest_fiat,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.asset.is_finite()
            && self.fiat.is_finite()
            && self.interest_asset.is_finite()
            && self.interest_fiat.is_finite()
    }
}

//! Trade execution: re-balancing a ledger toward a target exposure.
//!
//! Fees are charged on the leg received: the asset leg when buying, the fiat
//! leg when selling. Accrued borrow interest on the side being reduced is
//! settled before the trade is sized.

use super::error::{checked_div, GymError};
use super::portfolio::PortfolioLedger;

/// Proportional trading fee in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeeRate(f64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0.0);

    pub fn new(rate: f64) -> Result<Self, GymError> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(GymError::config_invalid(
                "env",
                "trading_fees",
                format!("trading_fees must be in [0, 1), got {rate}"),
            ));
        }
        Ok(FeeRate(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Net effect of one `trade_to_position` call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeFill {
    /// Asset units credited (negative when sold).
    pub asset_traded: f64,
    /// Fiat credited (negative when spent).
    pub fiat_traded: f64,
    /// Fee paid, valued in fiat at the trade price.
    pub fee_paid: f64,
}

impl TradeFill {
    fn merge(self, other: TradeFill) -> TradeFill {
        TradeFill {
            asset_traded: self.asset_traded + other.asset_traded,
            fiat_traded: self.fiat_traded + other.fiat_traded,
            fee_paid: self.fee_paid + other.fee_paid,
        }
    }
}

/// Re-balance `ledger` so that its exposure at `price` becomes `target`.
///
/// Steps:
/// 1. A trade that crosses zero exposure is split into a flattening trade
///    and a trade from flat.
/// 2. Interest owed on the reduced side is repaid in proportion to the
///    reduction.
/// 3. The asset delta is sized so the post-fee exposure lands on `target`.
pub fn trade_to_position(
    ledger: &mut PortfolioLedger,
    target: f64,
    price: f64,
    fee: FeeRate,
) -> Result<TradeFill, GymError> {
    let current = ledger.position(price)?;
    if target * current < 0.0 {
        let flatten = trade_to_position(ledger, 0.0, price, fee)?;
        let rest = rebalance(ledger, target, 0.0, price, fee)?;
        return Ok(flatten.merge(rest));
    }
    rebalance(ledger, target, current, price, fee)
}

fn rebalance(
    ledger: &mut PortfolioLedger,
    target: f64,
    current: f64,
    price: f64,
    fee: FeeRate,
) -> Result<TradeFill, GymError> {
    repay_interest(ledger, target, current)?;

    let fee = fee.value();
    let mut delta = checked_div(target * ledger.valuation(price), price, "trade size")? - ledger.asset;

    let fill = if delta > 0.0 {
        delta = checked_div(delta, 1.0 - fee + fee * target, "buy size")?;
        let asset_in = delta * (1.0 - fee);
        ledger.asset += asset_in;
        ledger.fiat -= delta * price;
        TradeFill {
            asset_traded: asset_in,
            fiat_traded: -delta * price,
            fee_paid: delta * fee * price,
        }
    } else {
        delta = checked_div(delta, 1.0 - fee * target, "sell size")?;
        let fiat_in = -delta * price * (1.0 - fee);
        ledger.asset += delta;
        ledger.fiat += fiat_in;
        TradeFill {
            asset_traded: delta,
            fiat_traded: fiat_in,
            fee_paid: -delta * price * fee,
        }
    };

    if !ledger.is_finite() {
        return Err(GymError::non_finite("ledger after trade"));
    }
    Ok(fill)
}

fn repay_interest(ledger: &mut PortfolioLedger, target: f64, current: f64) -> Result<(), GymError> {
    let ratio = if target <= 0.0 && current < 0.0 {
        checked_div(target, current, "short interest ratio")?.min(1.0)
    } else if target >= 1.0 && current > 1.0 {
        checked_div(target - 1.0, current - 1.0, "long interest ratio")?.min(1.0)
    } else {
        1.0
    };

    if ratio < 1.0 {
        ledger.asset -= (1.0 - ratio) * ledger.interest_asset;
        ledger.fiat -= (1.0 - ratio) * ledger.interest_fiat;
        ledger.interest_asset *= ratio;
        ledger.interest_fiat *= ratio;
    }
    Ok(())
}

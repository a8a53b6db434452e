// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Brokerage and statutory charge calculation for delivery equity trades.
//!
//! Every component is accumulated unrounded; only STT and stamp duty are
//! rounded to whole rupees, as the regulation requires. The breakdown is
//! rounded to two decimals once, at the end.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::{BrokerageConfig, TradeSide};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerageBreakdown {
    pub turnover: Decimal,
    pub brokerage: Decimal,
    pub stt: Decimal,
    pub exchange_charges: Decimal,
    pub sebi_charges: Decimal,
    pub ipft: Decimal,
    pub gst: Decimal,
    pub stamp_duty: Decimal,
    pub total_charges: Decimal,
    pub net_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetAmount {
    pub gross_amount: Decimal,
    pub brokerage_total: Decimal,
    pub net_amount: Decimal,
}

pub fn round_money(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn round_whole(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn pct(amount: Decimal, rate: Decimal) -> Decimal {
    amount * rate / HUNDRED
}

/// Clamps to `[min_charge, max_charge]`, ceiling first. An inverted config
/// (`min_charge > max_charge`) resolves to `min_charge`.
pub fn clamp_brokerage(raw: Decimal, cfg: &BrokerageConfig) -> Decimal {
    raw.min(cfg.max_charge).max(cfg.min_charge)
}

pub fn compute_brokerage(
    quantity: Decimal,
    price: Decimal,
    cfg: &BrokerageConfig,
    side: TradeSide,
) -> BrokerageBreakdown {
    let turnover = quantity * price;

    let rate = match side {
        TradeSide::Buy => cfg.buy_rate,
        TradeSide::Sell => cfg.sell_rate,
    };
    let brokerage = clamp_brokerage(pct(turnover, rate), cfg);

    let stt_rate = match side {
        TradeSide::Buy => cfg.stt_buy,
        TradeSide::Sell => cfg.stt_sell,
    };
    let stt = round_whole(pct(turnover, stt_rate));

    let exchange_charges = pct(turnover, cfg.exchange_charges);
    let sebi_charges = pct(turnover, cfg.sebi_charges);
    let ipft = pct(turnover, cfg.ipft_charges.unwrap_or(Decimal::ZERO));

    // Stamp duty is levied on the buyer only.
    let stamp_duty = match side {
        TradeSide::Buy => round_whole(pct(turnover, cfg.stamp_duty_buy)),
        TradeSide::Sell => Decimal::ZERO,
    };

    let gst = pct(brokerage + exchange_charges + sebi_charges + ipft, cfg.gst);

    let total_charges =
        brokerage + stt + exchange_charges + sebi_charges + ipft + gst + stamp_duty;
    let net_amount = match side {
        TradeSide::Buy => turnover + total_charges,
        TradeSide::Sell => turnover - total_charges,
    };

    BrokerageBreakdown {
        turnover: round_money(turnover),
        brokerage: round_money(brokerage),
        stt: round_money(stt),
        exchange_charges: round_money(exchange_charges),
        sebi_charges: round_money(sebi_charges),
        ipft: round_money(ipft),
        gst: round_money(gst),
        stamp_duty: round_money(stamp_duty),
        total_charges: round_money(total_charges),
        net_amount: round_money(net_amount),
    }
}

pub fn compute_net_amount(
    quantity: Decimal,
    price: Decimal,
    cfg: &BrokerageConfig,
    side: TradeSide,
) -> NetAmount {
    let b = compute_brokerage(quantity, price, cfg, side);
    NetAmount {
        gross_amount: b.turnover,
        brokerage_total: b.total_charges,
        net_amount: b.net_amount,
    }
}

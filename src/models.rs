// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotStatus {
    Active,
    Partial,
    Sold,
}

impl LotStatus {
    pub fn is_open(self) -> bool {
        self != LotStatus::Sold
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LotStatus::Active => "active",
            LotStatus::Partial => "partial",
            LotStatus::Sold => "sold",
        };
        f.write_str(s)
    }
}

/// One purchase batch. `paid` is the cost basis of the shares still held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub paid: Decimal,
    pub trade_price: Decimal,
    pub quantity: Decimal,
    pub current_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_quantity: Option<Decimal>,
    pub value: Decimal,
    pub profit_loss: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_date: Option<DateTime<Utc>>,
    pub status: LotStatus,
}

impl Stock {
    /// Marks the lot to `current_price`, refreshing `value` and `profit_loss`.
    pub fn mark_to(&mut self, price: Decimal) {
        self.current_price = price;
        self.value = self.quantity * price;
        self.profit_loss = self.value - self.paid;
    }

    pub fn avg_cost(&self) -> Option<Decimal> {
        if self.quantity.is_zero() {
            None
        } else {
            Some(self.paid / self.quantity)
        }
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Fields needed to open a new lot; id, value and status are derived.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub name: String,
    pub symbol: Option<String>,
    pub quantity: Decimal,
    pub trade_price: Decimal,
    pub current_price: Option<Decimal>,
    /// Defaults to `quantity * trade_price`.
    pub paid: Option<Decimal>,
    pub purchase_date: Option<DateTime<Utc>>,
}

/// Partial update of a lot's descriptive and pricing fields.
#[derive(Debug, Clone, Default)]
pub struct StockPatch {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub current_price: Option<Decimal>,
    pub purchase_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiPayment {
    pub month: u32,
    pub emi_amount: Decimal,
    pub principal_remaining: Decimal,
    #[serde(
        default,
        deserialize_with = "date_or_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stocks_sold: Option<Vec<String>>,
}

/// Accepts `2024-02-03` as well as an ISO timestamp such as
/// `2024-02-03T00:00:00.000Z`, keeping the UTC calendar day of the latter.
fn date_or_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid date '{}'", raw)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: String,
    pub name: String,
    pub principal_amount: Decimal,
    #[serde(rename = "totalEMI")]
    pub total_emi: Decimal,
    pub emi_per_month: Decimal,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_day: Option<u32>,
    pub payments_schedule: Vec<EmiPayment>,
}

impl Loan {
    /// Equal installments of `emi_per_month` with the remainder as the final one,
    /// so `principal_remaining` ends at zero.
    pub fn build_schedule(principal: Decimal, emi_per_month: Decimal) -> Vec<EmiPayment> {
        let mut schedule = Vec::new();
        if emi_per_month <= Decimal::ZERO {
            return schedule;
        }
        let mut remaining = principal;
        let mut month = 1;
        while remaining > Decimal::ZERO {
            let emi = emi_per_month.min(remaining);
            remaining -= emi;
            schedule.push(EmiPayment {
                month,
                emi_amount: emi,
                principal_remaining: remaining,
                due_date: None,
                paid: false,
                paid_date: None,
                stocks_sold: None,
            });
            month += 1;
        }
        schedule
    }

    pub fn payment(&self, month: u32) -> Option<&EmiPayment> {
        self.payments_schedule.iter().find(|p| p.month == month)
    }
}

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub name: String,
    pub principal_amount: Decimal,
    pub emi_per_month: Decimal,
    pub start_date: DateTime<Utc>,
    pub payment_day: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub payment_day: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("buy"),
            TradeSide::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(anyhow!("Unknown trade side '{}', expected buy|sell", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalePurpose {
    Emi,
    Reinvest,
    Profit,
    Other,
}

impl fmt::Display for SalePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SalePurpose::Emi => "emi",
            SalePurpose::Reinvest => "reinvest",
            SalePurpose::Profit => "profit",
            SalePurpose::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for SalePurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "emi" => Ok(SalePurpose::Emi),
            "reinvest" => Ok(SalePurpose::Reinvest),
            "profit" => Ok(SalePurpose::Profit),
            "other" => Ok(SalePurpose::Other),
            other => Err(anyhow!(
                "Unknown purpose '{}', expected emi|reinvest|profit|other",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub stock_id: String,
    pub stock_name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Gross turnover.
    pub total_amount: Decimal,
    /// Sum of every fee component.
    pub brokerage: Decimal,
    pub net_amount: Decimal,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emi_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<SalePurpose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_buy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_share: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_total: Option<Decimal>,
    #[serde(
        default,
        rename = "realizedPnL",
        skip_serializing_if = "Option::is_none"
    )]
    pub realized_pnl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_reverted(&self) -> bool {
        self.reverted.unwrap_or(false)
    }
}

/// Fee rate card. Every rate is a percentage of turnover except `gst`,
/// which is a percentage of the GST base, and the flat min/max charges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerageConfig {
    pub buy_rate: Decimal,
    pub sell_rate: Decimal,
    pub min_charge: Decimal,
    pub max_charge: Decimal,
    pub stt_buy: Decimal,
    pub stt_sell: Decimal,
    pub exchange_charges: Decimal,
    pub sebi_charges: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipft_charges: Option<Decimal>,
    pub gst: Decimal,
    pub stamp_duty_buy: Decimal,
    pub stamp_duty_sell: Decimal,
}

impl Default for BrokerageConfig {
    fn default() -> Self {
        Self {
            buy_rate: Decimal::new(1, 1),
            sell_rate: Decimal::new(1, 1),
            min_charge: Decimal::from(2),
            max_charge: Decimal::from(20),
            stt_buy: Decimal::new(1, 1),
            stt_sell: Decimal::new(25, 3),
            exchange_charges: Decimal::new(297, 5),
            sebi_charges: Decimal::new(1, 5),
            ipft_charges: Some(Decimal::new(1, 4)),
            gst: Decimal::from(18),
            stamp_duty_buy: Decimal::new(15, 3),
            stamp_duty_sell: Decimal::new(3, 3),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrokerageConfigPatch {
    pub buy_rate: Option<Decimal>,
    pub sell_rate: Option<Decimal>,
    pub min_charge: Option<Decimal>,
    pub max_charge: Option<Decimal>,
    pub stt_buy: Option<Decimal>,
    pub stt_sell: Option<Decimal>,
    pub exchange_charges: Option<Decimal>,
    pub sebi_charges: Option<Decimal>,
    pub ipft_charges: Option<Decimal>,
    pub gst: Option<Decimal>,
    pub stamp_duty_buy: Option<Decimal>,
    pub stamp_duty_sell: Option<Decimal>,
}

impl BrokerageConfigPatch {
    pub fn apply_to(&self, cfg: &mut BrokerageConfig) {
        macro_rules! set {
            ($($f:ident),*) => {
                $(if let Some(v) = self.$f { cfg.$f = v; })*
            };
        }
        set!(
            buy_rate,
            sell_rate,
            min_charge,
            max_charge,
            stt_buy,
            stt_sell,
            exchange_charges,
            sebi_charges,
            gst,
            stamp_duty_buy,
            stamp_duty_sell
        );
        if let Some(v) = self.ipft_charges {
            cfg.ipft_charges = Some(v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buy_rate.is_none()
            && self.sell_rate.is_none()
            && self.min_charge.is_none()
            && self.max_charge.is_none()
            && self.stt_buy.is_none()
            && self.stt_sell.is_none()
            && self.exchange_charges.is_none()
            && self.sebi_charges.is_none()
            && self.ipft_charges.is_none()
            && self.gst.is_none()
            && self.stamp_duty_buy.is_none()
            && self.stamp_duty_sell.is_none()
    }
}

/// Quote snapshot as returned by a quote provider and kept in the price cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPriceData {
    #[serde(default)]
    pub symbol: String,
    pub last_price: Decimal,
    #[serde(default)]
    pub change: Decimal,
    #[serde(default)]
    pub percent_change: Decimal,
    #[serde(default)]
    pub day_high: Decimal,
    #[serde(default)]
    pub day_low: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub stocks: Vec<Stock>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub brokerage_config: BrokerageConfig,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub price_cache: BTreeMap<String, StockPriceData>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            stocks: Vec::new(),
            loans: Vec::new(),
            transactions: Vec::new(),
            brokerage_config: BrokerageConfig::default(),
            last_updated: Utc::now(),
            price_cache: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_ends_at_zero_with_remainder_installment() {
        let schedule = Loan::build_schedule(Decimal::from(436980), Decimal::from(36670));
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule[0].principal_remaining, Decimal::from(400310));
        let last = schedule.last().unwrap();
        assert_eq!(last.month, 12);
        assert_eq!(last.emi_amount, Decimal::from(33610));
        assert!(last.principal_remaining.is_zero());
        assert!(
            schedule
                .windows(2)
                .all(|w| w[0].principal_remaining > w[1].principal_remaining)
        );
    }

    #[test]
    fn legacy_document_loads_without_newer_fields() {
        let raw = r#"{
            "stocks": [{
                "id": "stock-1", "name": "Tata Gold Exchange Traded Fund", "symbol": "TGOLDETF",
                "paid": 11030, "tradePrice": 11.03, "quantity": 1000, "currentPrice": 11.96,
                "value": 11960, "profitLoss": 930, "status": "active",
                "purchaseDate": "2024-01-15T00:00:00.000Z"
            }],
            "loans": [{
                "id": "loan-1", "name": "LOAN 1", "principalAmount": 100, "totalEMI": 100,
                "emiPerMonth": 50, "startDate": "2024-01-01T00:00:00.000Z",
                "paymentsSchedule": [
                    {"month": 1, "emiAmount": 50, "principalRemaining": 50, "paid": false},
                    {"month": 2, "emiAmount": 50, "principalRemaining": 0, "paid": false}
                ]
            }],
            "transactions": [],
            "brokerageConfig": {
                "buyRate": 0.05, "sellRate": 0.05, "minCharge": 20, "maxCharge": 20,
                "sttBuy": 0.1, "sttSell": 0.025, "exchangeCharges": 0.00297,
                "sebiCharges": 0.00001, "gst": 18, "stampDutyBuy": 0.015, "stampDutySell": 0.003
            },
            "lastUpdated": "2024-09-01T10:00:00.000Z"
        }"#;
        let data: AppData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.stocks[0].status, LotStatus::Active);
        assert_eq!(data.stocks[0].paid, Decimal::from(11030));
        assert!(data.brokerage_config.ipft_charges.is_none());
        assert!(data.loans[0].payment_day.is_none());
        assert!(data.price_cache.is_empty());
    }

    #[test]
    fn due_date_accepts_plain_date_and_iso_timestamp() {
        let iso: EmiPayment = serde_json::from_str(
            r#"{"month":2,"emiAmount":50,"principalRemaining":0,"dueDate":"2024-02-03T00:00:00.000Z","paid":false}"#,
        )
        .unwrap();
        let plain: EmiPayment = serde_json::from_str(
            r#"{"month":2,"emiAmount":50,"principalRemaining":0,"dueDate":"2024-02-03","paid":false}"#,
        )
        .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 2, 3);
        assert_eq!(iso.due_date, expected);
        assert_eq!(plain.due_date, expected);

        let bad = serde_json::from_str::<EmiPayment>(
            r#"{"month":2,"emiAmount":50,"principalRemaining":0,"dueDate":"soon","paid":false}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn legacy_loan_with_iso_due_dates_loads() {
        let raw = r#"{
            "loans": [{
                "id": "loan-1", "name": "LOAN 1", "principalAmount": 100, "totalEMI": 100,
                "emiPerMonth": 100, "startDate": "2024-01-01T00:00:00.000Z",
                "paymentsSchedule": [{
                    "month": 1, "emiAmount": 100, "principalRemaining": 0,
                    "dueDate": "2024-02-03T00:00:00.000Z", "paid": true,
                    "paidDate": "2024-02-03T09:30:00.000Z"
                }]
            }],
            "lastUpdated": "2024-09-01T10:00:00.000Z"
        }"#;
        let data: AppData = serde_json::from_str(raw).unwrap();
        let payment = &data.loans[0].payments_schedule[0];
        assert_eq!(payment.due_date, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert!(payment.paid);
    }

    #[test]
    fn transaction_uses_original_field_names() {
        let txn = Transaction {
            id: "txn-1".into(),
            side: TradeSide::Sell,
            stock_id: "stock-1".into(),
            stock_name: "ABC".into(),
            quantity: Decimal::from(5),
            price: Decimal::from(10),
            total_amount: Decimal::from(50),
            brokerage: Decimal::from(2),
            net_amount: Decimal::from(48),
            date: Utc::now(),
            loan_id: None,
            emi_month: None,
            purpose: Some(SalePurpose::Emi),
            linked_buy_id: None,
            notes: None,
            cost_per_share: None,
            cost_total: None,
            realized_pnl: Some(Decimal::from(3)),
            buy_amount: None,
            sell_amount: None,
            reverted: None,
            reverted_at: None,
        };
        let v = serde_json::to_value(&txn).unwrap();
        assert_eq!(v["type"], "sell");
        assert_eq!(v["purpose"], "emi");
        assert!(v.get("realizedPnL").is_some());
        assert!(v.get("loanId").is_none());
    }
}

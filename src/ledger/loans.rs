// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::{LedgerStore, TradeDetails, new_id};
use crate::errors::{LedgerError, LedgerResult};
use crate::fees::round_money;
use crate::models::{EmiPayment, Loan, LoanPatch, NewLoan, SalePurpose, Transaction};
use crate::store::DataStore;

const DEFAULT_PAYMENT_DAY: u32 = 3;
const LAST_SAFE_DAY: u32 = 28;

/// Explicit due date if set, else the loan's start month advanced by
/// `month - 1`, on the payment day capped at the 28th.
pub fn due_date(loan: &Loan, payment: &EmiPayment) -> Option<NaiveDate> {
    if let Some(d) = payment.due_date {
        return Some(d);
    }
    let day = loan
        .payment_day
        .unwrap_or(DEFAULT_PAYMENT_DAY)
        .clamp(1, LAST_SAFE_DAY);
    let start = loan.start_date.date_naive();
    NaiveDate::from_ymd_opt(start.year(), start.month(), day)?
        .checked_add_months(Months::new(payment.month.saturating_sub(1)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEmiItem {
    pub loan_id: String,
    pub loan_name: String,
    pub month: u32,
    pub emi_amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEmi {
    pub total_amount: Decimal,
    pub count: usize,
    pub date: Option<NaiveDate>,
    pub items: Vec<UpcomingEmiItem>,
}

/// Groups the unpaid installments falling on the next due date. When every
/// unpaid installment is overdue, the earliest overdue date is used instead.
pub fn compute_upcoming_emi(loans: &[Loan], today: NaiveDate) -> UpcomingEmi {
    let unpaid: Vec<UpcomingEmiItem> = loans
        .iter()
        .flat_map(|loan| {
            loan.payments_schedule
                .iter()
                .filter(|p| !p.paid)
                .filter_map(move |p| {
                    due_date(loan, p).map(|due| UpcomingEmiItem {
                        loan_id: loan.id.clone(),
                        loan_name: loan.name.clone(),
                        month: p.month,
                        emi_amount: p.emi_amount,
                        due_date: due,
                    })
                })
        })
        .collect();

    let target = unpaid
        .iter()
        .map(|i| i.due_date)
        .filter(|d| *d >= today)
        .min()
        .or_else(|| unpaid.iter().map(|i| i.due_date).min());

    let Some(date) = target else {
        return UpcomingEmi {
            total_amount: Decimal::ZERO,
            count: 0,
            date: None,
            items: Vec::new(),
        };
    };
    let items: Vec<UpcomingEmiItem> = unpaid.into_iter().filter(|i| i.due_date == date).collect();
    UpcomingEmi {
        total_amount: items.iter().map(|i| i.emi_amount).sum(),
        count: items.len(),
        date: Some(date),
        items,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiSummary {
    pub total_emi: Decimal,
    pub paid_emi: Decimal,
    pub pending_emi: Decimal,
    pub next_emi_amount: Decimal,
}

/// A lot sale used to fund an installment.
#[derive(Debug, Clone)]
pub struct LotSale {
    pub stock_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl<S: DataStore> LedgerStore<S> {
    pub fn loan(&self, id: &str) -> Option<&Loan> {
        self.data.loans.iter().find(|l| l.id == id)
    }

    fn loan_index(&self, id: &str) -> LedgerResult<usize> {
        self.data
            .loans
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| LedgerError::loan(id))
    }

    fn require_installment(&self, loan_id: &str, month: u32) -> LedgerResult<&EmiPayment> {
        let loan = self.loan(loan_id).ok_or_else(|| LedgerError::loan(loan_id))?;
        loan.payment(month)
            .ok_or_else(|| LedgerError::emi(loan_id, month))
    }

    pub fn add_loan(&mut self, new: NewLoan) -> LedgerResult<Loan> {
        if new.principal_amount <= Decimal::ZERO || new.emi_per_month <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                requested: new.emi_per_month,
                available: new.principal_amount,
            });
        }
        let schedule = Loan::build_schedule(new.principal_amount, new.emi_per_month);
        let loan = Loan {
            id: new_id("loan"),
            name: new.name.trim().to_string(),
            principal_amount: new.principal_amount,
            total_emi: schedule.iter().map(|p| p.emi_amount).sum(),
            emi_per_month: new.emi_per_month,
            start_date: new.start_date,
            payment_day: new.payment_day,
            payments_schedule: schedule,
        };
        info!(id = %loan.id, months = loan.payments_schedule.len(), "loan added");
        self.data.loans.push(loan.clone());
        self.persist()?;
        Ok(loan)
    }

    pub fn update_loan(&mut self, id: &str, patch: LoanPatch) -> LedgerResult<Loan> {
        let idx = self.loan_index(id)?;
        let loan = &mut self.data.loans[idx];
        if let Some(name) = patch.name {
            loan.name = name.trim().to_string();
        }
        if let Some(start) = patch.start_date {
            loan.start_date = start;
        }
        if let Some(day) = patch.payment_day {
            loan.payment_day = Some(day);
        }
        let updated = loan.clone();
        self.persist()?;
        Ok(updated)
    }

    pub fn mark_emi_paid(
        &mut self,
        loan_id: &str,
        month: u32,
        stocks_sold: Vec<String>,
    ) -> LedgerResult<()> {
        let idx = self.loan_index(loan_id)?;
        let payment = self.data.loans[idx]
            .payments_schedule
            .iter_mut()
            .find(|p| p.month == month)
            .ok_or_else(|| LedgerError::emi(loan_id, month))?;
        payment.paid = true;
        payment.paid_date = Some(Utc::now());
        payment.stocks_sold = Some(stocks_sold);
        info!(loan = loan_id, month, "EMI marked paid");
        self.persist()
    }

    /// Sells from one lot to fund an installment, tagging the sale with it.
    pub fn sell_for_emi(
        &mut self,
        stock_id: &str,
        quantity: Decimal,
        price: Decimal,
        loan_id: &str,
        month: u32,
    ) -> LedgerResult<Transaction> {
        self.require_installment(loan_id, month)?;
        let txn = self.sell_lot(stock_id, quantity, price, emi_details(loan_id, month))?;
        self.persist()?;
        Ok(txn)
    }

    /// Sells every listed lot and marks the installment paid with them.
    /// All sales are validated before the first one is applied.
    pub fn pay_emi_with_stocks(
        &mut self,
        loan_id: &str,
        month: u32,
        sales: &[LotSale],
    ) -> LedgerResult<Vec<Transaction>> {
        if self.require_installment(loan_id, month)?.paid {
            return Err(LedgerError::UnsupportedOperation(format!(
                "installment {} of loan '{}' is already paid",
                month, loan_id
            )));
        }

        let mut left: HashMap<&str, Decimal> = HashMap::new();
        for sale in sales {
            let lot = self
                .stock(&sale.stock_id)
                .ok_or_else(|| LedgerError::stock(&sale.stock_id))?;
            if sale.price <= Decimal::ZERO {
                return Err(LedgerError::InvalidPrice(sale.price));
            }
            let avail = left.entry(sale.stock_id.as_str()).or_insert(lot.quantity);
            if sale.quantity <= Decimal::ZERO || sale.quantity > *avail {
                return Err(LedgerError::InvalidQuantity {
                    requested: sale.quantity,
                    available: *avail,
                });
            }
            *avail -= sale.quantity;
        }

        let mut txns = Vec::with_capacity(sales.len());
        for sale in sales {
            txns.push(self.sell_lot(
                &sale.stock_id,
                sale.quantity,
                sale.price,
                emi_details(loan_id, month),
            )?);
        }
        let mut sold_ids: Vec<String> = Vec::new();
        for sale in sales {
            if !sold_ids.contains(&sale.stock_id) {
                sold_ids.push(sale.stock_id.clone());
            }
        }
        // mark_emi_paid persists the sales along with the installment.
        self.mark_emi_paid(loan_id, month, sold_ids)?;
        Ok(txns)
    }

    pub fn upcoming_emi(&self, today: NaiveDate) -> UpcomingEmi {
        compute_upcoming_emi(&self.data.loans, today)
    }

    pub fn emi_summary(&self) -> EmiSummary {
        let mut total = Decimal::ZERO;
        let mut paid = Decimal::ZERO;
        let mut next = None;
        for p in self.data.loans.iter().flat_map(|l| &l.payments_schedule) {
            total += p.emi_amount;
            if p.paid {
                paid += p.emi_amount;
            } else if next.is_none() {
                next = Some(p.emi_amount);
            }
        }
        EmiSummary {
            total_emi: round_money(total),
            paid_emi: round_money(paid),
            pending_emi: round_money(total - paid),
            next_emi_amount: round_money(next.unwrap_or(Decimal::ZERO)),
        }
    }
}

fn emi_details(loan_id: &str, month: u32) -> TradeDetails {
    TradeDetails {
        loan_id: Some(loan_id.to_string()),
        emi_month: Some(month),
        purpose: Some(SalePurpose::Emi),
        ..Default::default()
    }
}

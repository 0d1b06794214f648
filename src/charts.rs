// 📊 Chart series for the summarize step
// Daily net flow, unusually large transactions, running balance.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bank::BankTransaction;

#[derive(Error, Debug, PartialEq)]
pub enum ChartError {
    #[error("No transactions in the selected window")]
    NoRows,

    #[error("Non-finite amount at line {0}")]
    NonFiniteAmount(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    /// Net signed amount per calendar day, ascending
    pub daily_net: Vec<(NaiveDate, f64)>,
    /// Rows whose absolute amount exceeds twice the mean amount
    pub large_transactions: Vec<BankTransaction>,
    /// Cumulative signed amount in row order
    pub running_balance: Vec<f64>,
}

impl ChartSet {
    pub fn from_rows(rows: &[BankTransaction]) -> Result<Self, ChartError> {
        if rows.is_empty() {
            return Err(ChartError::NoRows);
        }
        if let Some(bad) = rows.iter().find(|r| !r.amount.is_finite()) {
            return Err(ChartError::NonFiniteAmount(bad.line));
        }

        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for row in rows {
            *daily.entry(row.timestamp.date()).or_insert(0.0) += row.signed_amount();
        }

        let mean = rows.iter().map(|r| r.amount).sum::<f64>() / rows.len() as f64;
        let threshold = mean * 2.0;
        let large_transactions = rows
            .iter()
            .filter(|r| r.amount.abs() > threshold)
            .cloned()
            .collect();

        let running_balance = rows
            .iter()
            .scan(0.0, |balance, row| {
                *balance += row.signed_amount();
                Some(*balance)
            })
            .collect();

        Ok(ChartSet {
            daily_net: daily.into_iter().collect(),
            large_transactions,
            running_balance,
        })
    }
}

// 🏦 Bank Statement Analyzer
// CSV/XLSX → rows → window filter (anchored at the FIRST transaction) → salary / spend / savings / investments

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, Months, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::documents::extension;

// ============================================================================
// SCHEMA
// ============================================================================

pub const COL_INDICATOR: &str = "CR_DR_INDICATOR";
pub const COL_AMOUNT: &str = "TXN_AMOUNT_LCY";
pub const COL_TIMESTAMP: &str = "TXN_DATE_TIME";
pub const COL_DESCRIPTION: &str = "TXN_DESC";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_INDICATOR, COL_AMOUNT, COL_TIMESTAMP, COL_DESCRIPTION];

/// Salary credits are recognized by description (substring, case-insensitive)
static SALARY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)SALARY|PAYROLL").unwrap());

/// Investment keywords. Substring match: "Stockholm trip" counts too.
static INVESTMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)MF|STOCK|BOND|FD|ETF|MUTUAL FUND").unwrap());

/// Accepted TXN_DATE_TIME layouts, tried in order after RFC 3339
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Error, Debug)]
pub enum BankStatementError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read spreadsheet: {0}")]
    Xlsx(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("Bank statement has no transactions")]
    Empty,

    #[error("Unsupported bank statement format: {0}")]
    UnsupportedFormat(String),
}

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    Credit,
    Debit,
    Other(String),
}

impl Indicator {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("C") {
            Indicator::Credit
        } else if raw.eq_ignore_ascii_case("D") {
            Indicator::Debit
        } else {
            Indicator::Other(raw.to_string())
        }
    }
}

/// One statement row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub indicator: Indicator,
    pub description: String,
    /// Line in the source file (header is line 1)
    pub line: usize,
}

impl BankTransaction {
    pub fn is_salary_credit(&self) -> bool {
        self.indicator == Indicator::Credit && SALARY_PATTERN.is_match(&self.description)
    }

    pub fn is_investment(&self) -> bool {
        INVESTMENT_PATTERN.is_match(&self.description)
    }

    /// Credits positive, debits negative, anything else as written
    pub fn signed_amount(&self) -> f64 {
        match self.indicator {
            Indicator::Debit => -self.amount,
            _ => self.amount,
        }
    }
}

/// Aggregation window, anchored at the earliest transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    #[default]
    Total,
    Weekly,
    Monthly,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Total, Window::Monthly, Window::Weekly];

    pub fn label(&self) -> &'static str {
        match self {
            Window::Total => "Total",
            Window::Weekly => "Weekly",
            Window::Monthly => "Monthly",
        }
    }

    /// End of the window for a statement spanning [start, latest]
    pub fn end(&self, start: NaiveDateTime, latest: NaiveDateTime) -> NaiveDateTime {
        match self {
            Window::Total => latest,
            Window::Weekly => start
                .checked_add_signed(chrono::Duration::days(7))
                .unwrap_or(NaiveDateTime::MAX),
            Window::Monthly => start
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDateTime::MAX),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" => Ok(Window::Total),
            "weekly" => Ok(Window::Weekly),
            "monthly" => Ok(Window::Monthly),
            other => Err(format!("unknown window '{}' (expected total, weekly or monthly)", other)),
        }
    }
}

/// The four headline numbers for a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSummary {
    pub window: Window,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub salary: f64,
    pub expenditure: f64,
    /// salary − expenditure (other credits are deliberately ignored)
    pub savings: f64,
    pub investments: f64,
}

impl fmt::Display for BankSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "**Bank Statement Analysis ({} View - Based on First Transaction Date):**",
            self.window.label()
        )?;
        writeln!(f, "- **Total Salary Credited:** Rs {:.2}", self.salary)?;
        writeln!(f, "- **Total Expenditure:** Rs {:.2}", self.expenditure)?;
        writeln!(f, "- **Estimated Savings:** Rs {:.2}", self.savings)?;
        write!(f, "- **Total Investments Identified:** Rs {:.2}", self.investments)
    }
}

/// Summary plus the filtered rows (for charting)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAnalysis {
    pub summary: BankSummary,
    pub rows: Vec<BankTransaction>,
}

impl BankAnalysis {
    pub fn summary_text(&self) -> String {
        self.summary.to_string()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Row as read from the file, before value parsing
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "CR_DR_INDICATOR")]
    indicator: String,
    #[serde(rename = "TXN_AMOUNT_LCY")]
    amount: String,
    #[serde(rename = "TXN_DATE_TIME")]
    timestamp: String,
    #[serde(rename = "TXN_DESC", default)]
    description: String,
}

impl RawRow {
    fn parse(self, line: usize) -> Result<BankTransaction, BankStatementError> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| BankStatementError::InvalidRow {
            line,
            reason: format!("unparseable {} '{}'", COL_TIMESTAMP, self.timestamp),
        })?;

        let amount = parse_amount(&self.amount).ok_or_else(|| BankStatementError::InvalidRow {
            line,
            reason: format!("non-numeric {} '{}'", COL_AMOUNT, self.amount),
        })?;

        Ok(BankTransaction {
            timestamp,
            amount,
            indicator: Indicator::parse(&self.indicator),
            description: self.description,
            line,
        })
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn check_columns<S: AsRef<str>>(headers: &[S]) -> Result<(), BankStatementError> {
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h.as_ref() == **required))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(BankStatementError::MissingColumns(missing))
    }
}

fn load_csv(path: &Path) -> Result<Vec<BankTransaction>, BankStatementError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    check_columns(&headers)?;

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<RawRow>().enumerate() {
        let line = i + 2;
        let raw = result.map_err(|e| BankStatementError::InvalidRow {
            line,
            reason: e.to_string(),
        })?;
        rows.push(raw.parse(line)?);
    }

    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Error(e) => format!("{:?}", e),
    }
}

fn load_xlsx(path: &Path) -> Result<Vec<BankTransaction>, BankStatementError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| BankStatementError::Xlsx(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BankStatementError::Xlsx("workbook has no sheets".to_string()))?
        .map_err(|e| BankStatementError::Xlsx(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|row| row.iter().map(cell_to_string).collect())
        .unwrap_or_default();
    check_columns(&headers)?;

    let column = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
    let (ind, amt, ts, desc) = (
        column(COL_INDICATOR),
        column(COL_AMOUNT),
        column(COL_TIMESTAMP),
        column(COL_DESCRIPTION),
    );

    let mut rows = Vec::new();
    for (i, row) in sheet_rows.enumerate() {
        let cell = |idx: usize| row.get(idx).map(cell_to_string).unwrap_or_default();
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let raw = RawRow {
            indicator: cell(ind),
            amount: cell(amt),
            timestamp: cell(ts),
            description: cell(desc),
        };
        rows.push(raw.parse(i + 2)?);
    }

    Ok(rows)
}

/// Load every row of a statement file (csv or xlsx)
pub fn load_statement(path: &Path) -> Result<Vec<BankTransaction>, BankStatementError> {
    let rows = match extension(path).as_deref() {
        Some("csv") => load_csv(path)?,
        Some("xlsx") => load_xlsx(path)?,
        other => {
            return Err(BankStatementError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            ))
        }
    };

    debug!(path = %path.display(), rows = rows.len(), "Loaded bank statement");
    Ok(rows)
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Sum of matching amounts; an empty match is `0.0`, never `-0.0`
fn total<F>(rows: &[BankTransaction], matches: F) -> f64
where
    F: Fn(&BankTransaction) -> bool,
{
    rows.iter()
        .filter(|&r| matches(r))
        .fold(0.0, |acc, r| acc + r.amount)
}

/// Filter rows to the window and aggregate
pub fn analyze_rows(rows: &[BankTransaction], window: Window) -> Result<BankAnalysis, BankStatementError> {
    let start = rows.iter().map(|r| r.timestamp).min().ok_or(BankStatementError::Empty)?;
    let latest = rows.iter().map(|r| r.timestamp).max().ok_or(BankStatementError::Empty)?;
    let end = window.end(start, latest);

    let filtered: Vec<BankTransaction> = rows
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= end)
        .cloned()
        .collect();

    let salary = total(&filtered, BankTransaction::is_salary_credit);
    let expenditure = total(&filtered, |r| r.indicator == Indicator::Debit);
    let investments = total(&filtered, BankTransaction::is_investment);

    Ok(BankAnalysis {
        summary: BankSummary {
            window,
            start,
            end,
            salary,
            expenditure,
            savings: salary - expenditure,
            investments,
        },
        rows: filtered,
    })
}

/// Load a statement file and analyze it for the given window
pub fn analyze(path: &Path, window: Window) -> Result<BankAnalysis, BankStatementError> {
    let rows = load_statement(path)?;
    let analysis = analyze_rows(&rows, window)?;

    info!(
        path = %path.display(),
        window = %window,
        rows = analysis.rows.len(),
        salary = analysis.summary.salary,
        expenditure = analysis.summary.expenditure,
        "Analyzed bank statement"
    );

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("statement.csv");
        fs::write(&path, body).unwrap();
        path
    }

    fn tx(ts: &str, amount: f64, indicator: &str, description: &str) -> BankTransaction {
        BankTransaction {
            timestamp: parse_timestamp(ts).unwrap(),
            amount,
            indicator: Indicator::parse(indicator),
            description: description.to_string(),
            line: 0,
        }
    }

    #[test]
    fn test_end_to_end_total_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "CR_DR_INDICATOR,TXN_AMOUNT_LCY,TXN_DATE_TIME,TXN_DESC\n\
             C,5000,2024-01-01 09:00:00,SALARY JAN\n\
             D,1200,2024-01-03 18:30:00,GROCERY\n\
             D,200,2024-01-10 11:00:00,STOCK PURCHASE\n",
        );

        let analysis = analyze(&path, Window::Total).unwrap();
        let s = &analysis.summary;
        assert_eq!(format!("{:.2}", s.salary), "5000.00");
        assert_eq!(format!("{:.2}", s.expenditure), "1400.00");
        assert_eq!(format!("{:.2}", s.savings), "3600.00");
        assert_eq!(format!("{:.2}", s.investments), "200.00");
        assert_eq!(analysis.rows.len(), 3);

        let text = analysis.summary_text();
        assert!(text.starts_with("**Bank Statement Analysis (Total View - Based on First Transaction Date):**"));
        assert!(text.contains("- **Total Salary Credited:** Rs 5000.00"));
        assert!(text.contains("- **Total Expenditure:** Rs 1400.00"));
        assert!(text.contains("- **Estimated Savings:** Rs 3600.00"));
        assert!(text.contains("- **Total Investments Identified:** Rs 200.00"));
    }

    #[test]
    fn test_savings_is_salary_minus_debits() {
        let rows = vec![
            tx("2024-02-01", 1000.0, "C", "SALARY JAN"),
            tx("2024-02-02", 300.0, "D", "RENT"),
            // Non-salary credits don't count toward savings
            tx("2024-02-03", 999.0, "C", "REFUND"),
        ];

        let summary = analyze_rows(&rows, Window::Total).unwrap().summary;
        assert_eq!(summary.salary, 1000.0);
        assert_eq!(summary.expenditure, 300.0);
        assert_eq!(summary.savings, 700.0);
    }

    #[test]
    fn test_empty_totals_render_as_zero() {
        let rows = vec![tx("2024-02-01", 5000.0, "C", "SALARY")];

        let text = analyze_rows(&rows, Window::Total).unwrap().summary_text();
        assert!(text.contains("- **Total Expenditure:** Rs 0.00"));
        assert!(text.contains("- **Total Investments Identified:** Rs 0.00"));
        assert!(!text.contains("-0.00"));

        let rows = vec![tx("2024-02-01", 40.0, "D", "COFFEE")];
        let text = analyze_rows(&rows, Window::Total).unwrap().summary_text();
        assert!(text.contains("- **Total Salary Credited:** Rs 0.00"));
    }

    #[test]
    fn test_single_transaction_windows_agree() {
        let rows = vec![tx("2024-03-15 10:00:00", 42.0, "D", "COFFEE")];

        let total = analyze_rows(&rows, Window::Total).unwrap();
        let weekly = analyze_rows(&rows, Window::Weekly).unwrap();
        let monthly = analyze_rows(&rows, Window::Monthly).unwrap();

        assert_eq!(total.rows, weekly.rows);
        assert_eq!(weekly.rows, monthly.rows);
        assert_eq!(total.rows.len(), 1);
        assert_eq!(total.summary.expenditure, monthly.summary.expenditure);
    }

    #[test]
    fn test_window_anchored_at_first_transaction() {
        let rows = vec![
            tx("2024-01-10", 100.0, "D", "A"),
            tx("2024-01-01", 100.0, "D", "B"),
            tx("2024-01-08", 100.0, "D", "C"),
            tx("2024-01-09", 100.0, "D", "D"),
            tx("2024-02-01", 100.0, "D", "E"),
            tx("2024-02-02", 100.0, "D", "F"),
        ];

        let weekly = analyze_rows(&rows, Window::Weekly).unwrap();
        // [Jan 1, Jan 8] inclusive
        let descs: Vec<&str> = weekly.rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descs, vec!["B", "C"]);

        let monthly = analyze_rows(&rows, Window::Monthly).unwrap();
        assert_eq!(monthly.rows.len(), 5);
        assert_eq!(monthly.summary.end, parse_timestamp("2024-02-01").unwrap());

        let total = analyze_rows(&rows, Window::Total).unwrap();
        assert_eq!(total.rows.len(), 6);
    }

    #[test]
    fn test_monthly_window_clamps_to_month_end() {
        let start = parse_timestamp("2024-01-31").unwrap();
        let end = Window::Monthly.end(start, start);
        assert_eq!(end, parse_timestamp("2024-02-29").unwrap());
    }

    #[test]
    fn test_investment_keywords_are_substrings() {
        let rows = vec![
            tx("2024-01-01", 10.0, "D", "invest in STOCKS"),
            tx("2024-01-01", 20.0, "D", "Stockholm trip"),
            tx("2024-01-01", 40.0, "C", "mutual fund redemption"),
            tx("2024-01-01", 80.0, "D", "GROCERY"),
        ];

        let summary = analyze_rows(&rows, Window::Total).unwrap().summary;
        assert_eq!(summary.investments, 70.0);
    }

    #[test]
    fn test_salary_requires_credit_indicator() {
        let rows = vec![
            tx("2024-01-01", 500.0, "c", "monthly payroll"),
            tx("2024-01-02", 50.0, "D", "SALARY ADVANCE REPAYMENT"),
        ];

        let summary = analyze_rows(&rows, Window::Total).unwrap().summary;
        assert_eq!(summary.salary, 500.0);
        assert_eq!(summary.expenditure, 50.0);
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "TXN_DATE_TIME,AMOUNT\n2024-01-01,5\n");

        match analyze(&path, Window::Total) {
            Err(BankStatementError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["CR_DR_INDICATOR", "TXN_AMOUNT_LCY", "TXN_DESC"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_amount_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "CR_DR_INDICATOR,TXN_AMOUNT_LCY,TXN_DATE_TIME,TXN_DESC\n\
             C,100,2024-01-01,OK\n\
             D,lots,2024-01-02,BAD\n",
        );

        match analyze(&path, Window::Total) {
            Err(BankStatementError::InvalidRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "CR_DR_INDICATOR,TXN_AMOUNT_LCY,TXN_DATE_TIME,TXN_DESC\n");
        assert!(matches!(analyze(&path, Window::Weekly), Err(BankStatementError::Empty)));
    }

    #[test]
    fn test_extra_columns_and_thousands_separators() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "ACCOUNT_NO,TXN_DESC,TXN_AMOUNT_LCY,CR_DR_INDICATOR,TXN_DATE_TIME\n\
             001, PAYROLL ACME ,\"1,25,000.50\",C,05/01/2024 10:00:00\n",
        );

        let analysis = analyze(&path, Window::Total).unwrap();
        assert_eq!(analysis.summary.salary, 125000.5);
        assert_eq!(
            analysis.rows[0].timestamp,
            parse_timestamp("2024-01-05 10:00:00").unwrap()
        );
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = parse_timestamp("2024-06-01 00:00:00").unwrap();
        for raw in ["2024-06-01", "01-06-2024", "01/06/2024", "2024/06/01", "2024-06-01T00:00:00", "2024-06-01T00:00:00+05:30"] {
            assert_eq!(parse_timestamp(raw), Some(expected), "format {raw}");
        }
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_window_from_str() {
        assert_eq!("Monthly".parse::<Window>().unwrap(), Window::Monthly);
        assert_eq!(" weekly ".parse::<Window>().unwrap(), Window::Weekly);
        assert!("daily".parse::<Window>().is_err());
    }

    #[test]
    fn test_unsupported_statement_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.txt");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_statement(&path),
            Err(BankStatementError::UnsupportedFormat(_))
        ));
    }
}

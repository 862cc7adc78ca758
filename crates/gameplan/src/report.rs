//! Yearly text summaries of a projection.

use std::fmt::Write;

use gameplan_core::scenarios::PercentileBands;
use gameplan_core::schedule::Frequency;
use gameplan_core::{Portfolio, TimeSeries};
use jiff::civil::Date;

/// One calendar year of a projection. Flows are yearly sums; balances are
/// the last value seen in the year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearSummary {
    pub year: i16,
    pub gross_income: f64,
    pub take_home: f64,
    pub spending: f64,
    pub cash: f64,
    pub net_worth: f64,
}

fn yearly_sums(series: &TimeSeries) -> TimeSeries {
    series.resample_sum(Frequency::Yearly)
}

fn at(series: &TimeSeries, bucket: Date) -> f64 {
    series.get(bucket).unwrap_or(0.0)
}

pub fn yearly_summaries(portfolio: &Portfolio) -> gameplan_core::Result<Vec<YearSummary>> {
    let gross: Vec<TimeSeries> = portfolio
        .income_streams()
        .values()
        .map(|s| s.gross().clone())
        .collect();
    let gross = yearly_sums(&TimeSeries::sum_aligned(gross.iter()));
    let take_home = yearly_sums(&portfolio.income_streams().total_take_home());
    let net = yearly_sums(&portfolio.net_cashflows());
    let cash = portfolio.cash_savings()?.resample_last(Frequency::Yearly);
    let net_worth = portfolio.net_worth().resample_last(Frequency::Yearly);

    let rows = net_worth
        .iter()
        .map(|(bucket, worth)| {
            let take_home = at(&take_home, bucket);
            YearSummary {
                year: bucket.year(),
                gross_income: at(&gross, bucket),
                take_home,
                spending: take_home - at(&net, bucket),
                cash: at(&cash, bucket),
                net_worth: worth,
            }
        })
        .collect();
    Ok(rows)
}

pub fn render_summaries(rows: &[YearSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "year", "gross", "take-home", "spending", "cash", "net worth"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "{:>6} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            r.year, r.gross_income, r.take_home, r.spending, r.cash, r.net_worth
        );
    }
    out
}

/// Year-end value of each band
pub fn render_bands(bands: &PercentileBands) -> String {
    let yearly: Vec<(f64, TimeSeries)> = bands
        .bands()
        .iter()
        .map(|(p, s)| (*p, s.resample_last(Frequency::Yearly)))
        .collect();
    let Some((_, first)) = yearly.first() else {
        return String::new();
    };

    let mut out = String::new();
    let _ = write!(out, "{:>6}", "year");
    for (p, _) in &yearly {
        let _ = write!(out, " {:>14}", format!("p{}", (p * 100.0).round()));
    }
    out.push('\n');
    for bucket in first.dates() {
        let _ = write!(out, "{:>6}", bucket.year());
        for (_, s) in &yearly {
            let _ = write!(out, " {:>14.2}", at(s, *bucket));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gameplan_core::schedule::DateRange;
    use gameplan_core::{OnConflict, Salary};
    use jiff::civil::date;

    fn plan() -> Portfolio {
        let horizon = DateRange::daily_horizon(date(2025, 1, 1), 3).unwrap();
        let mut portfolio = Portfolio::new(1_000.0, 0.0, horizon).unwrap();
        let salary = Salary::annual(12_000.0, Frequency::Monthly, date(2025, 1, 1))
            .no_growth()
            .last_paycheck(date(2025, 12, 31))
            .build()
            .unwrap();
        portfolio.add_income_stream("salary", salary, OnConflict::Error).unwrap();
        portfolio
    }

    #[test]
    fn test_yearly_summaries() {
        let rows = yearly_summaries(&plan()).unwrap();
        assert_eq!(rows.first().map(|r| r.year), Some(2025));
        assert_eq!(rows.last().map(|r| r.year), Some(2028));

        let first = rows[0];
        assert!((first.gross_income - 12_000.0).abs() < 1e-6, "gross {}", first.gross_income);
        assert!((first.take_home - 12_000.0).abs() < 1e-6);
        assert!(first.spending.abs() < 1e-6, "spending {}", first.spending);
        assert!((first.cash - 13_000.0).abs() < 1e-6, "cash {}", first.cash);
        assert!((rows[1].net_worth - 13_000.0).abs() < 1e-6);
        assert_eq!(rows[1].gross_income, 0.0);
    }

    #[test]
    fn test_render_has_header_and_rows() {
        let rows = yearly_summaries(&plan()).unwrap();
        let text = render_summaries(&rows);
        assert_eq!(text.lines().count(), rows.len() + 1);
        assert!(text.lines().next().unwrap().contains("net worth"));
        assert!(text.contains("13000.00"));
    }
}

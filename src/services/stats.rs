// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Member-facing aggregates over a user's history rows.

use crate::error::AppError;
use crate::models::{HistoryEntry, User};
use crate::time_utils::{self, Window};
use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Months shown in the stats breakdown, current month included.
pub const BREAKDOWN_MONTHS: u32 = 6;

/// Window used for `/transactions?filter=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    All,
    ThisMonth,
    LastMonth,
}

impl TransactionFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim).unwrap_or("all") {
            "" | "all" => Ok(TransactionFilter::All),
            "this-month" => Ok(TransactionFilter::ThisMonth),
            "last-month" => Ok(TransactionFilter::LastMonth),
            other => Err(AppError::BadRequest(format!("Unknown filter '{other}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionFilter::All => "all",
            TransactionFilter::ThisMonth => "this-month",
            TransactionFilter::LastMonth => "last-month",
        }
    }

    pub fn window(&self, now: DateTime<Utc>, offset: &FixedOffset) -> Option<Window> {
        match self {
            TransactionFilter::All => None,
            TransactionFilter::ThisMonth => Some(time_utils::local_month(now, offset, 0)),
            TransactionFilter::LastMonth => Some(time_utils::local_month(now, offset, 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Savings {
    pub total_cash: i64,
    /// Credited during the last 30 days
    pub monthly_total: i64,
    /// Whole 30-day periods since the account was created, at least 1
    pub months_saving: i64,
    pub total_transactions: usize,
    pub last_update: Option<DateTime<Utc>>,
}

pub fn savings(user: &User, history: &[HistoryEntry], now: DateTime<Utc>) -> Savings {
    let thirty_days_ago = now - Duration::days(30);
    let monthly_total = history
        .iter()
        .filter(|h| h.created_at >= thirty_days_ago)
        .map(|h| h.amount)
        .sum();

    let months_saving = ((now - user.created_at).num_days() / 30).max(1);

    Savings {
        total_cash: user.cash,
        monthly_total,
        months_saving,
        total_transactions: history.len(),
        last_update: (user.updated_at.timestamp() > 0).then_some(user.updated_at),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    /// `YYYY-MM` in local time
    pub month: String,
    pub amount: i64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct MemberStats {
    pub total_transactions: usize,
    pub total_amount: i64,
    pub average_amount: f64,
    /// Oldest month first
    pub monthly_breakdown: Vec<MonthBucket>,
    pub largest: Option<HistoryEntry>,
}

pub fn member_stats(
    history: &[HistoryEntry],
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> MemberStats {
    let total_transactions = history.len();
    let total_amount: i64 = history.iter().map(|h| h.amount).sum();
    let average_amount = if total_transactions > 0 {
        total_amount as f64 / total_transactions as f64
    } else {
        0.0
    };

    let monthly_breakdown = (0..BREAKDOWN_MONTHS)
        .rev()
        .map(|back| {
            let window = time_utils::local_month(now, offset, back);
            let rows = history.iter().filter(|h| window.contains(h.created_at));
            let (amount, count) = rows.fold((0i64, 0usize), |(sum, n), h| (sum + h.amount, n + 1));
            MonthBucket {
                month: time_utils::month_key(window.start, offset),
                amount,
                count,
            }
        })
        .collect();

    // Earliest row wins ties, matching a strict "greater than" scan.
    let largest = history
        .iter()
        .filter(|h| h.amount > 0)
        .fold(None::<&HistoryEntry>, |best, h| match best {
            Some(b) if b.amount >= h.amount => Some(b),
            _ => Some(h),
        })
        .cloned();

    MemberStats {
        total_transactions,
        total_amount,
        average_amount,
        monthly_breakdown,
        largest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::TimeZone;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn entry(amount: i64, at: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            title: None,
            kind: None,
            message: None,
            admin_name: None,
            corps: None,
            created_at: at,
        }
    }

    #[test]
    fn breakdown_uses_local_months() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let history = vec![
            entry(20000, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            // 2026-02-28 18:00 UTC is already March 1st in WIB
            entry(5000, Utc.with_ymd_and_hms(2026, 2, 28, 18, 0, 0).unwrap()),
            entry(10000, Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()),
            entry(1, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()),
        ];

        let stats = member_stats(&history, now, &wib());
        let months: Vec<&str> = stats
            .monthly_breakdown
            .iter()
            .map(|b| b.month.as_str())
            .collect();
        assert_eq!(
            months,
            vec!["2025-10", "2025-11", "2025-12", "2026-01", "2026-02", "2026-03"]
        );

        let march = &stats.monthly_breakdown[5];
        assert_eq!((march.amount, march.count), (25000, 2));
        assert_eq!(stats.monthly_breakdown[4].count, 0);
        assert_eq!(stats.monthly_breakdown[3].amount, 10000);

        assert_eq!(stats.total_transactions, 4);
        assert_eq!(stats.total_amount, 35001);
        assert_eq!(stats.largest.map(|h| h.amount), Some(20000));
    }

    #[test]
    fn empty_history_stats() {
        let stats = member_stats(&[], Utc::now(), &wib());
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.average_amount, 0.0);
        assert!(stats.largest.is_none());
        assert_eq!(stats.monthly_breakdown.len(), 6);
    }

    #[test]
    fn savings_totals() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let mut user = User::new_member(
            "u".to_string(),
            "U".to_string(),
            "u@example.com".to_string(),
            "SOPS".to_string(),
            Role::User,
            String::new(),
            now - Duration::days(95),
        );
        user.cash = 30000;

        let history = vec![
            entry(20000, now - Duration::days(2)),
            entry(10000, now - Duration::days(45)),
        ];
        let s = savings(&user, &history, now);
        assert_eq!(s.total_cash, 30000);
        assert_eq!(s.monthly_total, 20000);
        assert_eq!(s.months_saving, 3);
        assert_eq!(s.total_transactions, 2);

        user.created_at = now;
        assert_eq!(savings(&user, &[], now).months_saving, 1);
    }

    #[test]
    fn filter_parse() {
        assert_eq!(TransactionFilter::parse(None).unwrap(), TransactionFilter::All);
        assert_eq!(
            TransactionFilter::parse(Some("last-month")).unwrap(),
            TransactionFilter::LastMonth
        );
        assert!(TransactionFilter::parse(Some("yesterday")).is_err());
    }
}

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, Offset, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct PaylaterPolicy {
    pub surcharge: Decimal,
    // spend allowed per tier within one calendar month
    pub tier_step: Decimal,
    pub due_days: i64,
    pub delinquency_months: u32,
    pub utc_offset: FixedOffset,
}

impl Default for PaylaterPolicy {
    fn default() -> Self {
        Self {
            surcharge: default_surcharge(),
            tier_step: default_tier_step(),
            due_days: 30,
            delinquency_months: 2,
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surcharge {
    pub fee: Decimal,
    pub tier_after: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

impl PaylaterPolicy {
    pub fn compute_surcharge(
        &self,
        existing_total: Decimal,
        new_total: Decimal,
        tier: i32,
    ) -> Surcharge {
        if existing_total + new_total > Decimal::from(tier) * self.tier_step {
            Surcharge {
                fee: self.surcharge,
                tier_after: tier + 1,
            }
        } else {
            Surcharge {
                fee: Decimal::ZERO,
                tier_after: tier,
            }
        }
    }

    // A missing flag row or an empty month always pays the surcharge.
    pub fn quote_surcharge(
        &self,
        existing_total: Decimal,
        existing_orders: usize,
        new_total: Decimal,
        flag_tier: Option<i32>,
    ) -> Decimal {
        match flag_tier {
            None => self.surcharge,
            Some(_) if existing_orders == 0 => self.surcharge,
            Some(tier) => self.compute_surcharge(existing_total, new_total, tier).fee,
        }
    }

    pub fn month_window(&self, now: DateTime<Utc>) -> Result<MonthWindow, ServiceError> {
        let local = now.with_timezone(&self.utc_offset);
        let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
            .ok_or_else(|| ServiceError::Internal("invalid calendar month".to_string()))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ServiceError::Internal("calendar month overflow".to_string()))?;

        Ok(MonthWindow {
            start: self.local_midnight(first)?,
            end: self.local_midnight(next)?,
        })
    }

    pub fn delinquency_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ServiceError> {
        now.with_timezone(&self.utc_offset)
            .checked_sub_months(Months::new(self.delinquency_months))
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| ServiceError::Internal("delinquency cutoff out of range".to_string()))
    }

    /// Window of `month` (1..=12) in the local calendar year of `now`.
    pub fn month_of_year(
        &self,
        now: DateTime<Utc>,
        month: u32,
    ) -> Result<MonthWindow, ServiceError> {
        let year = now.with_timezone(&self.utc_offset).year();
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ServiceError::bad_request(format!("invalid month {month}")))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ServiceError::Internal("calendar month overflow".to_string()))?;

        Ok(MonthWindow {
            start: self.local_midnight(first)?,
            end: self.local_midnight(next)?,
        })
    }

    // Start of the local month `months_back` months before the current one.
    pub fn month_start_back(
        &self,
        now: DateTime<Utc>,
        months_back: u32,
    ) -> Result<DateTime<Utc>, ServiceError> {
        let local = now.with_timezone(&self.utc_offset);
        let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
            .and_then(|date| date.checked_sub_months(Months::new(months_back)))
            .ok_or_else(|| ServiceError::Internal("calendar month out of range".to_string()))?;
        self.local_midnight(first)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn due_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.due_days)
    }

    fn local_midnight(&self, date: NaiveDate) -> Result<DateTime<Utc>, ServiceError> {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ServiceError::Internal("invalid midnight".to_string()))?;
        self.utc_offset
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| ServiceError::Internal("ambiguous local midnight".to_string()))
    }
}

fn default_surcharge() -> Decimal {
    Decimal::new(2500, 0)
}

fn default_tier_step() -> Decimal {
    Decimal::new(1_000_000, 0)
}

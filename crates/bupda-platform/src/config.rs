use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use bupda_core::PaylaterPolicy;
use chrono::FixedOffset;
use rust_decimal::Decimal;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub http_addr: String,
    pub ledger_base_url: String,
    pub ledger_timeout: Duration,
    pub request_timeout: Duration,
    pub utc_offset_hours: i32,
    pub paylater_surcharge: Decimal,
    pub paylater_tier_step: Decimal,
    pub paylater_due_days: i64,
    pub paylater_delinquency_months: u32,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        default_http_addr: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let ledger_base_url = lookup("LEDGER_BASE_URL").context("LEDGER_BASE_URL is required")?;
        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string());

        Ok(Self {
            database_url,
            http_addr,
            ledger_base_url: ledger_base_url.trim_end_matches('/').to_string(),
            ledger_timeout: Duration::from_secs(parse_or(&lookup, "LEDGER_TIMEOUT_SECS", 30)?),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 50)?),
            utc_offset_hours: parse_or(&lookup, "APP_UTC_OFFSET_HOURS", 8)?,
            paylater_surcharge: parse_or(&lookup, "PAYLATER_SURCHARGE", Decimal::new(2500, 0))?,
            paylater_tier_step: parse_or(
                &lookup,
                "PAYLATER_TIER_STEP",
                Decimal::new(1_000_000, 0),
            )?,
            paylater_due_days: parse_or(&lookup, "PAYLATER_DUE_DAYS", 30)?,
            paylater_delinquency_months: parse_or(&lookup, "PAYLATER_DELINQUENCY_MONTHS", 2)?,
        })
    }

    pub fn policy(&self) -> Result<PaylaterPolicy> {
        let utc_offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or_else(|| anyhow!("APP_UTC_OFFSET_HOURS out of range: {}", self.utc_offset_hours))?;

        Ok(PaylaterPolicy {
            surcharge: self.paylater_surcharge,
            tier_step: self.paylater_tier_step,
            due_days: self.paylater_due_days,
            delinquency_months: self.paylater_delinquency_months,
            utc_offset,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is not valid: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = ServiceConfig::from_lookup(
            "0.0.0.0:8080",
            lookup(&[
                ("DATABASE_URL", "postgres://localhost/bupda"),
                ("LEDGER_BASE_URL", "https://ledger.example/"),
            ]),
        )
        .unwrap();

        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.ledger_base_url, "https://ledger.example");
        assert_eq!(config.request_timeout, Duration::from_secs(50));

        let policy = config.policy().unwrap();
        assert_eq!(policy.surcharge, Decimal::new(2500, 0));
        assert_eq!(policy.delinquency_months, 2);
        assert_eq!(policy.utc_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = ServiceConfig::from_lookup(
            "0.0.0.0:8080",
            lookup(&[("LEDGER_BASE_URL", "https://ledger.example")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ServiceConfig::from_lookup(
            "0.0.0.0:8080",
            lookup(&[
                ("DATABASE_URL", "postgres://localhost/bupda"),
                ("LEDGER_BASE_URL", "https://ledger.example"),
                ("PAYLATER_SURCHARGE", "two thousand"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("PAYLATER_SURCHARGE"));
    }

    #[test]
    fn offsets_beyond_a_day_fail_policy_construction() {
        let config = ServiceConfig::from_lookup(
            "0.0.0.0:8080",
            lookup(&[
                ("DATABASE_URL", "postgres://localhost/bupda"),
                ("LEDGER_BASE_URL", "https://ledger.example"),
                ("APP_UTC_OFFSET_HOURS", "30"),
            ]),
        )
        .unwrap();
        assert!(config.policy().is_err());
    }
}

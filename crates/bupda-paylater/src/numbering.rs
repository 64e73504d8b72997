use bupda_core::{OrderStore, ServiceError};
use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;

pub const ORDER_NUMBER_PREFIX: &str = "ORDER";
pub const BILL_NUMBER_PREFIX: &str = "TAGIHAN";

const MAX_NUMBER_ATTEMPTS: usize = 5;

/// `<prefix>/yyyyMMdd/<6 digits>`, dated in the shop's local offset.
pub fn generate_order_number(prefix: &str, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!(
        "{prefix}/{}/{suffix}",
        now.with_timezone(&offset).format("%Y%m%d")
    )
}

pub(crate) async fn unique_order_number(
    orders: &dyn OrderStore,
    prefix: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<String, ServiceError> {
    for _ in 0..MAX_NUMBER_ATTEMPTS {
        let candidate = generate_order_number(prefix, now, offset);
        if orders.find_by_number(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }

    Err(ServiceError::Internal(format!(
        "no free {prefix} number after {MAX_NUMBER_ATTEMPTS} attempts"
    )))
}

use bupda_core::{
    MonthWindow, OrderStore, PaylaterFlag, PaylaterPolicy, ServiceError, UserStore,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct MonthUsage {
    pub window: MonthWindow,
    pub total: Decimal,
    pub orders: usize,
}

pub(crate) async fn month_usage(
    orders: &dyn OrderStore,
    policy: &PaylaterPolicy,
    id_user: Uuid,
    now: DateTime<Utc>,
) -> Result<MonthUsage, ServiceError> {
    let window = policy.month_window(now)?;
    let placed = orders
        .find_paylater_between(id_user, window.start, window.end)
        .await?;

    Ok(MonthUsage {
        window,
        total: placed.iter().map(|order| order.total_bill).sum(),
        orders: placed.len(),
    })
}

pub(crate) async fn ensure_flag(
    users: &dyn UserStore,
    id_user: Uuid,
    window: &MonthWindow,
    now: DateTime<Utc>,
) -> Result<(PaylaterFlag, bool), ServiceError> {
    if let Some(flag) = users.find_flag(id_user, window.start).await? {
        return Ok((flag, false));
    }

    let fresh = PaylaterFlag {
        id: Uuid::new_v4(),
        id_user,
        period_start: window.start,
        tier: 1,
        created_at: now,
    };
    Ok(users.create_flag_if_absent(&fresh).await?)
}

use std::collections::BTreeMap;
use std::sync::Arc;

use bupda_core::models::ORDER_TYPE_PAYLATER_SETTLEMENT;
use bupda_core::{Order, OrderPatch, OrderStatus, OrderStore, PaylaterPolicy, ServiceError};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::context::RequestContext;

const HISTORY_MONTHS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaylaterMonth {
    pub month: NaiveDate,
    pub orders: usize,
    pub total_bill: Decimal,
    pub unpaid: Decimal,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    policy: PaylaterPolicy,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, policy: PaylaterPolicy) -> Self {
        Self { orders, policy }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.find_by_user(ctx.user_id, status).await?)
    }

    // Orders of other users read as missing.
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Order, ServiceError> {
        match self.orders.find_by_id(id).await? {
            Some(order) if order.id_user == ctx.user_id => Ok(order),
            _ => Err(ServiceError::not_found("order not found")),
        }
    }

    pub async fn cancel(&self, ctx: &RequestContext, id: Uuid) -> Result<Order, ServiceError> {
        let patch = OrderPatch {
            order_status: Some(OrderStatus::Canceled),
            canceled_at: Some(Utc::now()),
            ..OrderPatch::default()
        };
        self.transition(ctx, id, OrderStatus::Canceled, patch).await
    }

    pub async fn complete(&self, ctx: &RequestContext, id: Uuid) -> Result<Order, ServiceError> {
        let patch = OrderPatch {
            order_status: Some(OrderStatus::Completed),
            completed_at: Some(Utc::now()),
            ..OrderPatch::default()
        };
        self.transition(ctx, id, OrderStatus::Completed, patch).await
    }

    /// Paylater purchases placed in `month` of the current local year.
    pub async fn paylater_orders_by_month(
        &self,
        ctx: &RequestContext,
        month: u32,
    ) -> Result<Vec<Order>, ServiceError> {
        let window = self.policy.month_of_year(Utc::now(), month)?;
        let mut orders = self
            .orders
            .find_paylater_between(ctx.user_id, window.start, window.end)
            .await?;
        orders.sort_by(|a, b| b.ordered_at.cmp(&a.ordered_at));
        Ok(orders)
    }

    pub async fn paylater_history(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<PaylaterMonth>, ServiceError> {
        let now = Utc::now();
        let from = self.policy.month_start_back(now, HISTORY_MONTHS - 1)?;
        let to = self.policy.month_window(now)?.end;
        let orders = self
            .orders
            .find_paylater_between(ctx.user_id, from, to)
            .await?;

        let mut months: BTreeMap<NaiveDate, PaylaterMonth> = BTreeMap::new();
        for order in &orders {
            let local = self.policy.local_date(order.ordered_at);
            let Some(month) = NaiveDate::from_ymd_opt(local.year(), local.month(), 1) else {
                continue;
            };
            let entry = months.entry(month).or_insert_with(|| PaylaterMonth {
                month,
                orders: 0,
                total_bill: Decimal::ZERO,
                unpaid: Decimal::ZERO,
            });
            entry.orders += 1;
            entry.total_bill += order.total_bill;
            if !order.paylater_paid {
                entry.unpaid += order.total_bill;
            }
        }

        Ok(months.into_values().rev().collect())
    }

    /// Bill settlements, newest first. `index_date` narrows them to its month.
    pub async fn bill_payments(
        &self,
        ctx: &RequestContext,
        index_date: Option<NaiveDate>,
    ) -> Result<Vec<Order>, ServiceError> {
        let orders = self.orders.find_by_user(ctx.user_id, None).await?;
        Ok(orders
            .into_iter()
            .filter(|order| order.order_type == ORDER_TYPE_PAYLATER_SETTLEMENT)
            .filter(|order| {
                index_date.is_none_or(|index| {
                    let local = self.policy.local_date(order.ordered_at);
                    local.year() == index.year() && local.month() == index.month()
                })
            })
            .collect())
    }

    async fn transition(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        next: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Order, ServiceError> {
        let order = self.get(ctx, id).await?;
        if !order.order_status.can_transition_to(next) {
            return Err(ServiceError::bad_request(format!(
                "order {} cannot move from {:?} to {:?}",
                order.number_order, order.order_status, next
            )));
        }

        if !self.orders.update_order(id, &patch).await? {
            return Err(ServiceError::bad_request(format!(
                "order {} is already final",
                order.number_order
            )));
        }

        info!(
            request_id = %ctx.request_id,
            user_id = %ctx.user_id,
            "order {} moved to {:?}",
            order.number_order, next
        );

        let mut updated = order;
        patch.apply(&mut updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Harness, idr};
    use bupda_core::models::PRODUCT_TYPE_PAYMENT;
    use bupda_core::PaymentMethod;
    use chrono::{DateTime, Duration};

    async fn seed_settlement(h: &Harness, total: i64, ordered_at: DateTime<Utc>) -> Order {
        let order = h.seed_paylater_order(total, ordered_at).await;
        let mut settlement = order;
        settlement.id = Uuid::new_v4();
        settlement.number_order = format!("TAGIHAN/seed/{}", Uuid::new_v4().simple());
        settlement.product_type = PRODUCT_TYPE_PAYMENT.to_string();
        settlement.order_type = ORDER_TYPE_PAYLATER_SETTLEMENT;
        settlement.payment_method = PaymentMethod::TabunganBima;
        settlement.order_status = OrderStatus::Completed;
        h.orders.insert(settlement.clone()).await;
        settlement
    }

    #[tokio::test]
    async fn fresh_orders_can_be_canceled_once() {
        let h = Harness::new().await;
        let mut order = h.seed_paylater_order(10_000, Utc::now()).await;
        order.order_status = OrderStatus::Created;
        order.id = Uuid::new_v4();
        order.number_order = "ORDER/20240501/111111".to_string();
        h.orders.insert(order.clone()).await;

        let service = h.order_service();
        let canceled = service.cancel(&h.ctx(), order.id).await.unwrap();
        assert_eq!(canceled.order_status, OrderStatus::Canceled);
        assert!(canceled.canceled_at.is_some());

        let err = service.cancel(&h.ctx(), order.id).await.unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[tokio::test]
    async fn processed_orders_complete_but_do_not_cancel() {
        let h = Harness::new().await;
        let order = h.seed_paylater_order(10_000, Utc::now()).await;
        let service = h.order_service();

        assert_eq!(
            service.cancel(&h.ctx(), order.id).await.unwrap_err().kind(),
            "bad_request"
        );
        let completed = service.complete(&h.ctx(), order.id).await.unwrap();
        assert_eq!(completed.order_status, OrderStatus::Completed);
        assert!(completed.completed_at.is_some());

        let stored = service.get(&h.ctx(), order.id).await.unwrap();
        assert_eq!(stored.order_status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn other_users_orders_are_hidden() {
        let h = Harness::new().await;
        let order = h.seed_paylater_order(10_000, Utc::now()).await;
        let stranger = RequestContext::new("req-x", Uuid::new_v4());

        let err = h.order_service().get(&stranger, order.id).await.unwrap_err();
        assert_eq!(err, ServiceError::not_found("order not found"));
        assert!(h.order_service().list(&stranger, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let h = Harness::new().await;
        h.seed_paylater_order(10_000, Utc::now()).await;
        let service = h.order_service();

        assert_eq!(service.list(&h.ctx(), None).await.unwrap().len(), 1);
        assert_eq!(
            service
                .list(&h.ctx(), Some(OrderStatus::Processed))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(service
            .list(&h.ctx(), Some(OrderStatus::Created))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn month_listing_keeps_to_the_requested_month() {
        let h = Harness::new().await;
        let this_month = h.policy.month_window(Utc::now()).unwrap();
        let inside = h.seed_paylater_order(10_000, this_month.start).await;
        h.seed_paylater_order(20_000, this_month.start - Duration::minutes(1))
            .await;
        let month = h.policy.local_date(Utc::now()).month();

        let orders = h
            .order_service()
            .paylater_orders_by_month(&h.ctx(), month)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, inside.id);

        let err = h
            .order_service()
            .paylater_orders_by_month(&h.ctx(), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[tokio::test]
    async fn history_sums_each_month_newest_first() {
        let h = Harness::new().await;
        let now = Utc::now();
        let start = h.policy.month_window(now).unwrap().start;
        h.seed_paylater_order(100_000, start).await;
        h.seed_paylater_order(50_000, start + Duration::hours(1)).await;
        h.seed_paylater_order(30_000, start - Duration::days(1)).await;
        h.seed_paylater_order(
            70_000,
            h.policy.month_start_back(now, HISTORY_MONTHS).unwrap(),
        )
        .await;

        let history = h.order_service().paylater_history(&h.ctx()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].month, h.policy.local_date(start));
        assert_eq!(history[0].orders, 2);
        assert_eq!(history[0].total_bill, idr(150_000));
        assert_eq!(history[0].unpaid, idr(150_000));
        assert_eq!(history[1].total_bill, idr(30_000));
    }

    #[tokio::test]
    async fn bill_payments_only_list_settlements() {
        let h = Harness::new().await;
        let start = h.policy.month_window(Utc::now()).unwrap().start;
        let earlier = h.policy.month_start_back(Utc::now(), 2).unwrap();
        let recent = seed_settlement(&h, 100_000, start).await;
        let old = seed_settlement(&h, 40_000, earlier).await;

        let all = h.order_service().bill_payments(&h.ctx(), None).await.unwrap();
        assert_eq!(
            all.iter().map(|order| order.id).collect::<Vec<_>>(),
            vec![recent.id, old.id]
        );

        let narrowed = h
            .order_service()
            .bill_payments(&h.ctx(), Some(h.policy.local_date(earlier)))
            .await
            .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].id, old.id);
    }
}

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use bupda_core::{Order, OrderPatch, OrderStatus, OrderStore, PaymentMethod};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    fail_create: AtomicBool,
    fail_settlement: AtomicBool,
    fail_mark_paid: AtomicBool,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        self.orders.write().await.push(order);
    }

    pub async fn snapshot(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    pub fn fail_create_order(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    // Fails after the staged insert, before commit.
    pub fn fail_bill_settlement(&self, fail: bool) {
        self.fail_settlement.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mark_paid(&self, fail: bool) {
        self.fail_mark_paid.store(fail, Ordering::SeqCst);
    }
}

fn unpaid_paylater_sorted(orders: &[Order], id_user: Uuid) -> Vec<Order> {
    let mut unpaid: Vec<Order> = orders
        .iter()
        .filter(|order| order.id_user == id_user && order.is_unpaid_paylater())
        .cloned()
        .collect();
    unpaid.sort_by(|a, b| {
        a.ordered_at
            .cmp(&b.ordered_at)
            .then_with(|| a.number_order.cmp(&b.number_order))
    });
    unpaid
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &Order) -> anyhow::Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("order store unavailable");
        }
        let mut orders = self.orders.write().await;
        if orders
            .iter()
            .any(|existing| existing.id == order.id || existing.number_order == order.number_order)
        {
            bail!("duplicate order {}", order.number_order);
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|order| order.id == id).cloned())
    }

    async fn find_by_number(&self, number_order: &str) -> anyhow::Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .find(|order| order.number_order == number_order)
            .cloned())
    }

    async fn find_by_user(
        &self,
        id_user: Uuid,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .iter()
            .filter(|order| order.id_user == id_user)
            .filter(|order| status.is_none_or(|status| order.order_status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.ordered_at.cmp(&a.ordered_at));
        Ok(matching)
    }

    async fn find_unpaid_paylater(&self, id_user: Uuid) -> anyhow::Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(unpaid_paylater_sorted(&orders, id_user))
    }

    async fn find_oldest_unpaid_paylater(&self, id_user: Uuid) -> anyhow::Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(unpaid_paylater_sorted(&orders, id_user).into_iter().next())
    }

    async fn find_paylater_between(
        &self,
        id_user: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|order| {
                order.id_user == id_user
                    && order.payment_method == PaymentMethod::Paylater
                    && order.order_status != OrderStatus::Canceled
                    && order.ordered_at >= from
                    && order.ordered_at < to
            })
            .cloned()
            .collect())
    }

    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> anyhow::Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.iter_mut().find(|order| order.id == id) {
            Some(order) if !order.order_status.is_terminal() => {
                patch.apply(order);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_paylater_paid(&self, id: Uuid) -> anyhow::Result<bool> {
        if self.fail_mark_paid.load(Ordering::SeqCst) {
            bail!("order store unavailable");
        }

        let mut orders = self.orders.write().await;
        match orders
            .iter_mut()
            .find(|order| order.id == id && order.is_unpaid_paylater())
        {
            Some(order) => {
                order.paylater_paid = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_bill_settlement(
        &self,
        id_user: Uuid,
        settlement: &Order,
    ) -> anyhow::Result<u64> {
        let mut orders = self.orders.write().await;

        // Stage on a copy so a failure leaves the committed state untouched.
        let mut staged = orders.clone();
        if staged
            .iter()
            .any(|existing| existing.number_order == settlement.number_order)
        {
            bail!("duplicate order {}", settlement.number_order);
        }
        staged.push(settlement.clone());
        if self.fail_settlement.load(Ordering::SeqCst) {
            bail!("bill settlement aborted");
        }

        let mut marked = 0;
        for order in staged
            .iter_mut()
            .filter(|order| order.id_user == id_user && order.is_unpaid_paylater())
        {
            order.paylater_paid = true;
            marked += 1;
        }

        *orders = staged;
        Ok(marked)
    }
}

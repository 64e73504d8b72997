use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    DesaContext, Order, OrderPatch, OrderStatus, PaylaterFlag, PaymentChannel, User, UserAccount,
};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: &Order) -> anyhow::Result<()>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Order>>;

    async fn find_by_number(&self, number_order: &str) -> anyhow::Result<Option<Order>>;

    async fn find_by_user(
        &self,
        id_user: Uuid,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<Vec<Order>>;

    // Oldest first.
    async fn find_unpaid_paylater(&self, id_user: Uuid) -> anyhow::Result<Vec<Order>>;

    async fn find_oldest_unpaid_paylater(&self, id_user: Uuid) -> anyhow::Result<Option<Order>>;

    async fn find_paylater_between(
        &self,
        id_user: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Order>>;

    // No-op on terminal orders.
    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> anyhow::Result<bool>;

    async fn mark_paylater_paid(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Inserts `settlement` and marks every unpaid paylater order of `id_user`
    /// paid in one transaction. Returns the number of orders marked.
    async fn record_bill_settlement(
        &self,
        id_user: Uuid,
        settlement: &Order,
    ) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_paylater_account(&self, id_user: Uuid) -> anyhow::Result<Option<UserAccount>>;

    async fn find_savings_account(&self, id_user: Uuid) -> anyhow::Result<Option<UserAccount>>;

    async fn find_desa(&self, id_desa: Uuid) -> anyhow::Result<Option<DesaContext>>;

    async fn find_flag(
        &self,
        id_user: Uuid,
        period_start: DateTime<Utc>,
    ) -> anyhow::Result<Option<PaylaterFlag>>;

    async fn create_flag_if_absent(
        &self,
        flag: &PaylaterFlag,
    ) -> anyhow::Result<(PaylaterFlag, bool)>;

    // false on a lost race
    async fn bump_flag_tier(&self, flag_id: Uuid, expected_tier: i32) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PaymentChannelStore: Send + Sync {
    async fn list_channels(&self) -> anyhow::Result<Vec<PaymentChannel>>;
}

use std::sync::Arc;

use bupda_core::{
    AccountKind, AccountType, DesaContext, Order, OrderStatus, PaylaterPolicy, PaymentChannel,
    PaymentMethod, PaymentStatus, User, UserAccount,
};
use bupda_memstore::{InMemoryOrderStore, InMemoryUserStore, LedgerScript, SimulatedLedger};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AccountService, OrderService, PaylaterService, PaymentChannelPresenter, RequestContext,
};

pub(crate) fn idr(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub(crate) struct Harness {
    pub orders: Arc<InMemoryOrderStore>,
    pub users: Arc<InMemoryUserStore>,
    pub ledger: Arc<SimulatedLedger>,
    pub policy: PaylaterPolicy,
    pub user: User,
    pub desa: DesaContext,
}

impl Harness {
    pub async fn new() -> Self {
        let desa = DesaContext {
            id_desa: Uuid::new_v4(),
            group_id_bupda: "GRP-001".to_string(),
            no_rekening: "1002003004".to_string(),
        };
        let user = User {
            id: Uuid::new_v4(),
            id_desa: Some(desa.id_desa),
            phone: "081234567890".to_string(),
            full_name: "Ni Luh Putu".to_string(),
            email: "luh@example.com".to_string(),
            nik: "5171010101900001".to_string(),
            address: "Jl. Raya Ubud 7".to_string(),
            account_type: AccountType::Normal,
            ledger_member_id: Some("MBR-77".to_string()),
            ledger_access_token: Some("token-77".to_string()),
            is_paylater: true,
            paylater_approved: true,
        };

        let users = Arc::new(InMemoryUserStore::new());
        users.insert_user(user.clone()).await;
        users.insert_desa(desa.clone()).await;
        users
            .insert_account(UserAccount {
                id: Uuid::new_v4(),
                id_user: user.id,
                kind: AccountKind::Paylater,
                id_account: "ACC-PL-77".to_string(),
                code: "201-77".to_string(),
                bin: "977".to_string(),
            })
            .await;
        users
            .insert_account(UserAccount {
                id: Uuid::new_v4(),
                id_user: user.id,
                kind: AccountKind::TabunganBima,
                id_account: "ACC-TB-77".to_string(),
                code: "101-77".to_string(),
                bin: "988".to_string(),
            })
            .await;
        for (code, name, method, fee) in [
            ("cash", "Cash", PaymentMethod::Cash, 0),
            ("qris", "QRIS", PaymentMethod::Qris, 1000),
            ("paylater", "Paylater", PaymentMethod::Paylater, 0),
        ] {
            users
                .insert_channel(PaymentChannel {
                    code: code.to_string(),
                    name: name.to_string(),
                    method,
                    fee: idr(fee),
                    active: true,
                })
                .await;
        }

        Self {
            orders: Arc::new(InMemoryOrderStore::new()),
            users,
            ledger: Arc::new(SimulatedLedger::new(LedgerScript::default())),
            policy: PaylaterPolicy::default(),
            user,
            desa,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new("req-test", self.user.id)
    }

    pub fn paylater(&self) -> PaylaterService {
        PaylaterService::new(
            self.orders.clone(),
            self.users.clone(),
            self.ledger.clone(),
            self.policy.clone(),
        )
    }

    pub fn presenter(&self) -> PaymentChannelPresenter {
        PaymentChannelPresenter::new(
            self.orders.clone(),
            self.users.clone(),
            self.users.clone(),
            self.policy.clone(),
        )
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.users.clone(), self.ledger.clone())
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.orders.clone(), self.policy.clone())
    }

    pub async fn seed_paylater_order(&self, total: i64, ordered_at: DateTime<Utc>) -> Order {
        let order = Order {
            id: Uuid::new_v4(),
            id_user: self.user.id,
            id_desa: Some(self.desa.id_desa),
            number_order: format!("ORDER/seed/{}", Uuid::new_v4().simple()),
            product_type: "product".to_string(),
            order_type: 1,
            full_name: self.user.full_name.clone(),
            email: self.user.email.clone(),
            phone: self.user.phone.clone(),
            shipping_cost: Decimal::ZERO,
            payment_cash: idr(total),
            payment_fee: Decimal::ZERO,
            sub_total: idr(total),
            total_bill: idr(total),
            payment_method: PaymentMethod::Paylater,
            payment_channel: "paylater".to_string(),
            payment_name: "Paylater".to_string(),
            payment_status: PaymentStatus::Paid,
            order_status: OrderStatus::Processed,
            paylater_paid: false,
            ordered_at,
            payment_due_at: None,
            payment_success_at: Some(ordered_at),
            completed_at: None,
            canceled_at: None,
        };
        self.orders.insert(order.clone()).await;
        order
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::LedgerCredential;

pub const PRODUCT_TYPE_PRODUCT: &str = "product";
pub const PRODUCT_TYPE_PAYMENT: &str = "payment";
pub const ORDER_TYPE_PURCHASE: i16 = 1;
pub const ORDER_TYPE_PAYLATER_SETTLEMENT: i16 = 9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    Va,
    Qris,
    Paylater,
    TabunganBima,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Va => "va",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Paylater => "paylater",
            PaymentMethod::TabunganBima => "tabungan_bima",
        }
    }

    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" | "cod" => Some(PaymentMethod::Cash),
            "credit_card" | "cc" => Some(PaymentMethod::CreditCard),
            "va" => Some(PaymentMethod::Va),
            "qris" => Some(PaymentMethod::Qris),
            "paylater" => Some(PaymentMethod::Paylater),
            "tabungan_bima" => Some(PaymentMethod::TabunganBima),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::Va => "Virtual Account",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::Paylater => "Paylater",
            PaymentMethod::TabunganBima => "Tabungan Bima",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
}

impl PaymentStatus {
    pub fn code(&self) -> i16 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Paid => 1,
            PaymentStatus::Expired => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(PaymentStatus::Pending),
            1 => Some(PaymentStatus::Paid),
            2 => Some(PaymentStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Processed,
    Delivering,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::Created => 0,
            OrderStatus::Processed => 1,
            OrderStatus::Delivering => 2,
            OrderStatus::Completed => 5,
            OrderStatus::Canceled => 9,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(OrderStatus::Created),
            1 => Some(OrderStatus::Processed),
            2 => Some(OrderStatus::Delivering),
            5 => Some(OrderStatus::Completed),
            9 => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Processed)
                | (OrderStatus::Created, OrderStatus::Canceled)
                | (OrderStatus::Processed, OrderStatus::Delivering)
                | (OrderStatus::Processed, OrderStatus::Completed)
                | (OrderStatus::Delivering, OrderStatus::Completed)
        )
    }
}

// `total_bill` should equal `sub_total + shipping_cost + payment_fee`; the
// store does not enforce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub id_user: Uuid,
    pub id_desa: Option<Uuid>,
    pub number_order: String,
    pub product_type: String,
    pub order_type: i16,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub shipping_cost: Decimal,
    pub payment_cash: Decimal,
    pub payment_fee: Decimal,
    pub sub_total: Decimal,
    pub total_bill: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_channel: String,
    pub payment_name: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub paylater_paid: bool,
    pub ordered_at: DateTime<Utc>,
    pub payment_due_at: Option<DateTime<Utc>>,
    pub payment_success_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn bill_is_consistent(&self) -> bool {
        self.total_bill == self.sub_total + self.shipping_cost + self.payment_fee
    }

    pub fn is_unpaid_paylater(&self) -> bool {
        self.payment_method == PaymentMethod::Paylater
            && !self.paylater_paid
            && self.order_status != OrderStatus::Canceled
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_success_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        *self == OrderPatch::default()
    }

    pub fn apply(&self, order: &mut Order) {
        if let Some(status) = self.order_status {
            order.order_status = status;
        }
        if let Some(status) = self.payment_status {
            order.payment_status = status;
        }
        if self.payment_success_at.is_some() {
            order.payment_success_at = self.payment_success_at;
        }
        if self.completed_at.is_some() {
            order.completed_at = self.completed_at;
        }
        if self.canceled_at.is_some() {
            order.canceled_at = self.canceled_at;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Normal,
    Merchant,
}

impl AccountType {
    pub fn code(&self) -> i16 {
        match self {
            AccountType::Normal => 1,
            AccountType::Merchant => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(AccountType::Normal),
            2 => Some(AccountType::Merchant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub id_desa: Option<Uuid>,
    pub phone: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub nik: String,
    pub address: String,
    pub account_type: AccountType,
    pub ledger_member_id: Option<String>,
    #[serde(skip_serializing)]
    pub ledger_access_token: Option<String>,
    pub is_paylater: bool,
    pub paylater_approved: bool,
}

impl User {
    pub fn ledger_credential(&self) -> Option<LedgerCredential> {
        let member_id = self.ledger_member_id.as_deref().map(str::trim)?;
        let access_token = self.ledger_access_token.as_deref().map(str::trim)?;
        if member_id.is_empty() || access_token.is_empty() {
            return None;
        }

        Some(LedgerCredential {
            member_id: member_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn can_use_paylater(&self) -> bool {
        self.is_paylater && self.paylater_approved
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Paylater,
    TabunganBima,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Paylater => "paylater",
            AccountKind::TabunganBima => "tabungan_bima",
        }
    }
}

// `id_account` is the ledger's opaque id, `code` the printed account number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: Uuid,
    pub id_user: Uuid,
    pub kind: AccountKind,
    pub id_account: String,
    pub code: String,
    pub bin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesaContext {
    pub id_desa: Uuid,
    pub group_id_bupda: String,
    pub no_rekening: String,
}

// tanggung renteng counter, one row per user and calendar month
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaylaterFlag {
    pub id: Uuid,
    pub id_user: Uuid,
    pub period_start: DateTime<Utc>,
    pub tier: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentChannel {
    pub code: String,
    pub name: String,
    pub method: PaymentMethod,
    pub fee: Decimal,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_orders_accept_no_transition() {
        for next in [
            OrderStatus::Created,
            OrderStatus::Processed,
            OrderStatus::Delivering,
            OrderStatus::Completed,
            OrderStatus::Canceled,
        ] {
            assert!(!OrderStatus::Completed.can_transition_to(next));
            assert!(!OrderStatus::Canceled.can_transition_to(next));
        }
    }

    #[test]
    fn only_fresh_orders_can_be_canceled() {
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Delivering.can_transition_to(OrderStatus::Canceled));
    }

    #[test]
    fn status_codes_match_stored_values() {
        assert_eq!(OrderStatus::Completed.code(), 5);
        assert_eq!(OrderStatus::from_code(9), Some(OrderStatus::Canceled));
        assert_eq!(OrderStatus::from_code(4), None);
        assert_eq!(PaymentStatus::Paid.code(), 1);
        assert_eq!(AccountType::from_code(2), Some(AccountType::Merchant));
    }

    #[test]
    fn payment_method_codes_are_case_insensitive() {
        assert_eq!(
            PaymentMethod::from_code(" PayLater "),
            Some(PaymentMethod::Paylater)
        );
        assert_eq!(PaymentMethod::TabunganBima.as_str(), "tabungan_bima");
        assert_eq!(PaymentMethod::from_code("bitcoin"), None);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            id_user: Uuid::new_v4(),
            id_desa: None,
            number_order: "ORDER/20240101/123456".to_string(),
            product_type: "product".to_string(),
            order_type: 1,
            full_name: String::new(),
            email: String::new(),
            phone: String::new(),
            shipping_cost: Decimal::ZERO,
            payment_cash: Decimal::new(10_000, 0),
            payment_fee: Decimal::ZERO,
            sub_total: Decimal::new(10_000, 0),
            total_bill: Decimal::new(10_000, 0),
            payment_method: PaymentMethod::Cash,
            payment_channel: "cash".to_string(),
            payment_name: "Cash".to_string(),
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Created,
            paylater_paid: false,
            ordered_at: now,
            payment_due_at: None,
            payment_success_at: None,
            completed_at: None,
            canceled_at: None,
        };

        let patch = OrderPatch {
            order_status: Some(OrderStatus::Canceled),
            canceled_at: Some(now),
            ..OrderPatch::default()
        };
        patch.apply(&mut order);

        assert_eq!(order.order_status, OrderStatus::Canceled);
        assert_eq!(order.canceled_at, Some(now));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.bill_is_consistent());
        assert!(!patch.is_empty());
        assert!(OrderPatch::default().is_empty());
    }
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failure(code: u16, message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelQuery {
    #[serde(default)]
    pub total_bill: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitRequest {
    pub loan_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthQuery {
    pub month: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDateQuery {
    pub index_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNumberResponse {
    pub no_rekening: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAccountResponse {
    pub va_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

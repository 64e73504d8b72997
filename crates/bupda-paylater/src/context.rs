use bupda_core::{LedgerCredential, ServiceError, User, UserStore};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Uuid,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            request_id: request_id.into(),
            user_id,
        }
    }
}

pub(crate) async fn load_user(
    users: &dyn UserStore,
    ctx: &RequestContext,
) -> Result<User, ServiceError> {
    users
        .find_user(ctx.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user not found"))
}

pub(crate) fn require_credential(user: &User) -> Result<LedgerCredential, ServiceError> {
    user.ledger_credential()
        .ok_or_else(|| ServiceError::bad_request("user belum terdaftar di BUPDA"))
}

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bupda_core::{
    AccountKind, AccountType, DesaContext, PaylaterFlag, PaymentChannel, PaymentChannelStore,
    PaymentMethod, User, UserAccount, UserStore,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::warn;
use uuid::Uuid;

const FLAG_COLUMNS: &str = "id, id_user, period_start, tier, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_account(&self, id_user: Uuid, kind: AccountKind) -> Result<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, id_user, id_account, code, bin
            FROM users_account
            WHERE id_user = $1 AND account_kind = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(id_user)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserAccount {
            id: row.try_get("id")?,
            id_user: row.try_get("id_user")?,
            kind,
            id_account: row.try_get("id_account")?,
            code: row.try_get("code")?,
            bin: row.try_get("bin")?,
        }))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.id_desa, u.phone, u.email, u.account_type,
                   u.ledger_member_id, u.ledger_access_token,
                   u.is_paylater, u.paylater_approved,
                   COALESCE(p.full_name, '') AS full_name,
                   COALESCE(p.nik, '') AS nik,
                   COALESCE(p.address, '') AS address
            FROM users u
            LEFT JOIN users_profile p ON p.id_user = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let account_type: i16 = row.try_get("account_type")?;
        Ok(Some(User {
            id: row.try_get("id")?,
            id_desa: row.try_get("id_desa")?,
            phone: row.try_get("phone")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            nik: row.try_get("nik")?,
            address: row.try_get("address")?,
            account_type: AccountType::from_code(account_type)
                .ok_or_else(|| anyhow!("unknown account type {account_type}"))?,
            ledger_member_id: row.try_get("ledger_member_id")?,
            ledger_access_token: row.try_get("ledger_access_token")?,
            is_paylater: row.try_get("is_paylater")?,
            paylater_approved: row.try_get("paylater_approved")?,
        }))
    }

    async fn find_paylater_account(&self, id_user: Uuid) -> Result<Option<UserAccount>> {
        self.find_account(id_user, AccountKind::Paylater).await
    }

    async fn find_savings_account(&self, id_user: Uuid) -> Result<Option<UserAccount>> {
        self.find_account(id_user, AccountKind::TabunganBima).await
    }

    async fn find_desa(&self, id_desa: Uuid) -> Result<Option<DesaContext>> {
        let row = sqlx::query("SELECT id, group_id_bupda, no_rekening FROM desa WHERE id = $1")
            .bind(id_desa)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(DesaContext {
            id_desa: row.try_get("id")?,
            group_id_bupda: row.try_get("group_id_bupda")?,
            no_rekening: row.try_get("no_rekening")?,
        }))
    }

    async fn find_flag(
        &self,
        id_user: Uuid,
        period_start: DateTime<Utc>,
    ) -> Result<Option<PaylaterFlag>> {
        let row = sqlx::query(&format!(
            "SELECT {FLAG_COLUMNS} FROM users_paylater_flag WHERE id_user = $1 AND period_start = $2"
        ))
        .bind(id_user)
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(flag_from_row).transpose()
    }

    async fn create_flag_if_absent(&self, flag: &PaylaterFlag) -> Result<(PaylaterFlag, bool)> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO users_paylater_flag ({FLAG_COLUMNS})
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id_user, period_start) DO NOTHING
            RETURNING {FLAG_COLUMNS}
            "#
        ))
        .bind(flag.id)
        .bind(flag.id_user)
        .bind(flag.period_start)
        .bind(flag.tier)
        .bind(flag.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((flag_from_row(&row)?, true));
        }

        let existing = self
            .find_flag(flag.id_user, flag.period_start)
            .await?
            .ok_or_else(|| anyhow!("paylater flag for {} vanished after conflict", flag.id_user))?;
        Ok((existing, false))
    }

    async fn bump_flag_tier(&self, flag_id: Uuid, expected_tier: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users_paylater_flag SET tier = tier + 1 WHERE id = $1 AND tier = $2",
        )
        .bind(flag_id)
        .bind(expected_tier)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PaymentChannelStore for PgUserStore {
    async fn list_channels(&self) -> Result<Vec<PaymentChannel>> {
        let rows = sqlx::query(
            r#"
            SELECT code, name, payment_method, fee, is_active
            FROM payment_channel
            ORDER BY sort_order ASC, code ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut channels = Vec::with_capacity(rows.len());
        for row in rows {
            let method: String = row.try_get("payment_method")?;
            let Some(method) = PaymentMethod::from_code(&method) else {
                warn!("skipping payment channel with unknown method {method}");
                continue;
            };
            channels.push(PaymentChannel {
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                method,
                fee: row.try_get("fee")?,
                active: row.try_get("is_active")?,
            });
        }

        Ok(channels)
    }
}

fn flag_from_row(row: &PgRow) -> Result<PaylaterFlag> {
    Ok(PaylaterFlag {
        id: row.try_get("id")?,
        id_user: row.try_get("id_user")?,
        period_start: row.try_get("period_start")?,
        tier: row.try_get("tier")?,
        created_at: row.try_get("created_at")?,
    })
}

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;

use super::{EntityStore, StoreError};
use crate::workflows::onboarding::domain::{
    BrokerageAccount, CashAccount, KycRecord, KycStatus, Transaction, User, UserId,
};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cash_accounts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        currency TEXT NOT NULL,
        balance TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS kyc_records (
        user_id TEXT PRIMARY KEY REFERENCES users(id),
        external_user_id TEXT NOT NULL UNIQUE,
        applicant_id TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        review_result TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS brokerage_accounts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        broker TEXT NOT NULL,
        external_customer_id TEXT NOT NULL,
        external_account_id TEXT NOT NULL,
        base_currency TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        account_id TEXT NOT NULL REFERENCES cash_accounts(id),
        kind TEXT NOT NULL,
        amount TEXT NOT NULL,
        currency TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

/// File-backed store built on sqlx; the schema is created on connect.
#[derive(Debug, Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    ///
    /// In-memory URLs are pinned to a single connection so every query sees the
    /// same database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true)
            .foreign_keys(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.apply_schema().await?;
        info!(%url, "sqlite entity store ready");
        Ok(store)
    }

    async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;
        }
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Translate unique-constraint violations into conflicts; everything else is fatal.
fn write_error(entity: &'static str, key: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::conflict(entity, key),
        _ => unavailable(err),
    }
}

fn corrupt(entity: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| StoreError::Corrupt {
        entity,
        detail: err.to_string(),
    }
}

fn decimal_column(row: &SqliteRow, column: &str, entity: &'static str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(column).map_err(corrupt(entity))?;
    Decimal::from_str(&raw).map_err(|err| StoreError::Corrupt {
        entity,
        detail: format!("{column}: {err}"),
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let map = corrupt("user");
    Ok(User {
        id: UserId(row.try_get("id").map_err(&map)?),
        email: row.try_get("email").map_err(&map)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&map)?,
    })
}

fn cash_account_from_row(row: &SqliteRow) -> Result<CashAccount, StoreError> {
    let map = corrupt("cash account");
    Ok(CashAccount {
        id: row.try_get("id").map_err(&map)?,
        user_id: UserId(row.try_get("user_id").map_err(&map)?),
        currency: row.try_get("currency").map_err(&map)?,
        balance: decimal_column(row, "balance", "cash account")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&map)?,
    })
}

fn kyc_from_row(row: &SqliteRow) -> Result<KycRecord, StoreError> {
    let map = corrupt("kyc record");
    let status: String = row.try_get("status").map_err(&map)?;
    Ok(KycRecord {
        user_id: UserId(row.try_get("user_id").map_err(&map)?),
        external_user_id: row.try_get("external_user_id").map_err(&map)?,
        applicant_id: row.try_get("applicant_id").map_err(&map)?,
        status: status.parse::<KycStatus>().map_err(|err| StoreError::Corrupt {
            entity: "kyc record",
            detail: err.to_string(),
        })?,
        review_result: row.try_get("review_result").map_err(&map)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&map)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(&map)?,
    })
}

fn brokerage_from_row(row: &SqliteRow) -> Result<BrokerageAccount, StoreError> {
    let map = corrupt("brokerage account");
    Ok(BrokerageAccount {
        id: row.try_get("id").map_err(&map)?,
        user_id: UserId(row.try_get("user_id").map_err(&map)?),
        broker: row.try_get("broker").map_err(&map)?,
        external_customer_id: row.try_get("external_customer_id").map_err(&map)?,
        external_account_id: row.try_get("external_account_id").map_err(&map)?,
        base_currency: row.try_get("base_currency").map_err(&map)?,
        status: row.try_get("status").map_err(&map)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&map)?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, StoreError> {
    let map = corrupt("transaction");
    Ok(Transaction {
        id: row.try_get("id").map_err(&map)?,
        user_id: UserId(row.try_get("user_id").map_err(&map)?),
        account_id: row.try_get("account_id").map_err(&map)?,
        kind: row.try_get("kind").map_err(&map)?,
        amount: decimal_column(row, "amount", "transaction")?,
        currency: row.try_get("currency").map_err(&map)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&map)?,
    })
}

const KYC_COLUMNS: &str =
    "user_id, external_user_id, applicant_id, status, review_result, created_at, updated_at";

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)")
            .bind(user.id.as_str())
            .bind(&user.email)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|err| write_error("user", &user.email, err))?;
        Ok(user)
    }

    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, email, created_at FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<User>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query("SELECT id, email, created_at FROM users ORDER BY rowid ASC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn insert_cash_account(&self, account: CashAccount) -> Result<CashAccount, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cash_accounts (id, user_id, currency, balance, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&account.id)
        .bind(account.user_id.as_str())
        .bind(&account.currency)
        .bind(account.balance.to_string())
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error("cash account", &account.id, err))?;
        Ok(account)
    }

    async fn fetch_cash_account(&self, id: &str) -> Result<Option<CashAccount>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, currency, balance, created_at FROM cash_accounts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(cash_account_from_row).transpose()
    }

    async fn insert_kyc(&self, record: KycRecord) -> Result<KycRecord, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO kyc_records ({KYC_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))
        .bind(record.user_id.as_str())
        .bind(&record.external_user_id)
        .bind(&record.applicant_id)
        .bind(record.status.label())
        .bind(record.review_result.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error("kyc record", record.user_id.as_str(), err))?;
        Ok(record)
    }

    async fn update_kyc(&self, record: KycRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE kyc_records
            SET applicant_id = ?2, status = ?3, review_result = ?4, updated_at = ?5
            WHERE user_id = ?1
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(&record.applicant_id)
        .bind(record.status.label())
        .bind(record.review_result.as_deref())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error("kyc record", record.user_id.as_str(), err))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("kyc record", record.user_id.0));
        }
        Ok(())
    }

    async fn fetch_kyc(&self, user_id: &UserId) -> Result<Option<KycRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {KYC_COLUMNS} FROM kyc_records WHERE user_id = ?1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(kyc_from_row).transpose()
    }

    async fn fetch_kyc_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {KYC_COLUMNS} FROM kyc_records WHERE applicant_id = ?1"
        ))
        .bind(applicant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(kyc_from_row).transpose()
    }

    async fn fetch_kyc_by_external_user(
        &self,
        external_user_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {KYC_COLUMNS} FROM kyc_records WHERE external_user_id = ?1"
        ))
        .bind(external_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(kyc_from_row).transpose()
    }

    async fn insert_brokerage_account(
        &self,
        account: BrokerageAccount,
    ) -> Result<BrokerageAccount, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO brokerage_accounts (
                id, user_id, broker, external_customer_id, external_account_id,
                base_currency, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&account.id)
        .bind(account.user_id.as_str())
        .bind(&account.broker)
        .bind(&account.external_customer_id)
        .bind(&account.external_account_id)
        .bind(&account.base_currency)
        .bind(&account.status)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error("brokerage account", &account.id, err))?;
        Ok(account)
    }

    async fn list_brokerage_accounts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BrokerageAccount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, broker, external_customer_id, external_account_id,
                   base_currency, status, created_at
            FROM brokerage_accounts
            WHERE user_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.iter().map(brokerage_from_row).collect()
    }

    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, account_id, kind, amount, currency, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.user_id.as_str())
        .bind(&transaction.account_id)
        .bind(&transaction.kind)
        .bind(transaction.amount.to_string())
        .bind(&transaction.currency)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error("transaction", &transaction.id, err))?;
        Ok(transaction)
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, account_id, kind, amount, currency, created_at
            FROM transactions
            WHERE user_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.iter().map(transaction_from_row).collect()
    }
}

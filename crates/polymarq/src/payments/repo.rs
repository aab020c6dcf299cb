use bigdecimal::BigDecimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::payments::model::{
    BankAccount, IncrementalPayment, InitialPayment, NewBankAccount, Party, PaymentStatus,
};

#[derive(Clone)]
pub struct PaymentsRepo {
    pool: PgPool,
}

impl PaymentsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Incremental payments
    // ----------------------------

    /// Most recent record still waiting on `party`'s half.
    pub async fn latest_incomplete(
        conn: &mut PgConnection,
        job_id: Uuid,
        party: Party,
    ) -> anyhow::Result<Option<IncrementalPayment>> {
        let sql = format!(
            r#"
            SELECT * FROM job_incremental_payments
            WHERE job_id = $1 AND {} = 0
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
            party.state_column()
        );

        let row = sqlx::query_as::<_, IncrementalPayment>(&sql)
            .bind(job_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn insert_state(
        conn: &mut PgConnection,
        job_id: Uuid,
        client_id: Uuid,
        technician_id: Uuid,
        currency: &str,
        party: Party,
        state: &BigDecimal,
    ) -> anyhow::Result<IncrementalPayment> {
        let sql = format!(
            r#"
            INSERT INTO job_incremental_payments (
                job_id, client_id, technician_id, currency, status, {}
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
            party.state_column()
        );

        let row = sqlx::query_as::<_, IncrementalPayment>(&sql)
            .bind(job_id)
            .bind(client_id)
            .bind(technician_id)
            .bind(currency)
            .bind(PaymentStatus::Initiated.as_str())
            .bind(state.round(2))
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn fill_state(
        conn: &mut PgConnection,
        payment_id: Uuid,
        party: Party,
        state: &BigDecimal,
    ) -> anyhow::Result<IncrementalPayment> {
        let sql = format!(
            r#"
            UPDATE job_incremental_payments
            SET {} = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
            party.state_column()
        );

        let row = sqlx::query_as::<_, IncrementalPayment>(&sql)
            .bind(payment_id)
            .bind(state.round(2))
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Sum of everything already paid out on the job.
    pub async fn paid_total(conn: &mut PgConnection, job_id: Uuid) -> anyhow::Result<BigDecimal> {
        let total: BigDecimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM job_incremental_payments
            WHERE job_id = $1 AND paid = TRUE
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    pub async fn mark_paid(
        conn: &mut PgConnection,
        payment_id: Uuid,
        amount: &BigDecimal,
        reference: &str,
    ) -> anyhow::Result<IncrementalPayment> {
        let row = sqlx::query_as::<_, IncrementalPayment>(
            r#"
            UPDATE job_incremental_payments
            SET amount = $2,
                paid = TRUE,
                transaction_reference = $3,
                status = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(amount.round(2))
        .bind(reference)
        .bind(PaymentStatus::Completed.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Paid records for a job, oldest first.
    pub async fn list_paid(&self, job_id: Uuid) -> anyhow::Result<Vec<IncrementalPayment>> {
        let rows = sqlx::query_as::<_, IncrementalPayment>(
            r#"
            SELECT * FROM job_incremental_payments
            WHERE job_id = $1 AND paid = TRUE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ----------------------------
    // Bank accounts
    // ----------------------------

    pub async fn bank_account_for(
        conn: &mut PgConnection,
        technician_id: Uuid,
    ) -> anyhow::Result<Option<BankAccount>> {
        let row = sqlx::query_as::<_, BankAccount>(
            "SELECT * FROM technician_bank_accounts WHERE technician_id = $1",
        )
        .bind(technician_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    /// One account per technician; re-registering replaces the details and
    /// clears the gateway codes minted for the old ones.
    pub async fn upsert_bank_account(
        &self,
        technician_id: Uuid,
        account: &NewBankAccount,
    ) -> anyhow::Result<BankAccount> {
        let row = sqlx::query_as::<_, BankAccount>(
            r#"
            INSERT INTO technician_bank_accounts (
                technician_id, bank_code, account_name, account_number
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (technician_id) DO UPDATE
            SET bank_code = EXCLUDED.bank_code,
                account_name = EXCLUDED.account_name,
                account_number = EXCLUDED.account_number,
                paystack_recipient_code = NULL,
                paystack_subaccount_code = NULL,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(technician_id)
        .bind(account.bank_code.trim())
        .bind(account.account_name.trim())
        .bind(account.account_number.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Stores whichever codes the gateway handed back; `None` keeps the old value.
    pub async fn set_gateway_codes(
        &self,
        account_id: Uuid,
        recipient_code: Option<&str>,
        subaccount_code: Option<&str>,
    ) -> anyhow::Result<BankAccount> {
        let row = sqlx::query_as::<_, BankAccount>(
            r#"
            UPDATE technician_bank_accounts
            SET paystack_recipient_code = COALESCE($2, paystack_recipient_code),
                paystack_subaccount_code = COALESCE($3, paystack_subaccount_code),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(recipient_code)
        .bind(subaccount_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ----------------------------
    // Initial payments
    // ----------------------------

    pub async fn get_or_create_initial(
        conn: &mut PgConnection,
        job_id: Uuid,
        client_id: Uuid,
        technician_id: Uuid,
        amount: &BigDecimal,
        currency: &str,
    ) -> anyhow::Result<InitialPayment> {
        // no-op update so RETURNING yields the existing row too
        let row = sqlx::query_as::<_, InitialPayment>(
            r#"
            INSERT INTO job_initial_payments (
                job_id, client_id, technician_id, amount, currency, status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT unique_job_initial_payment DO UPDATE
            SET updated_at = job_initial_payments.updated_at
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(client_id)
        .bind(technician_id)
        .bind(amount.round(2))
        .bind(currency)
        .bind(PaymentStatus::Initiated.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    pub async fn set_initial_reference(
        conn: &mut PgConnection,
        payment_id: Uuid,
        reference: &str,
    ) -> anyhow::Result<InitialPayment> {
        let row = sqlx::query_as::<_, InitialPayment>(
            r#"
            UPDATE job_initial_payments
            SET transaction_reference = $2, status = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(reference)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Returns the payment only if this call flipped it to paid.
    pub async fn mark_initial_paid_by_reference(
        &self,
        reference: &str,
    ) -> anyhow::Result<Option<InitialPayment>> {
        let row = sqlx::query_as::<_, InitialPayment>(
            r#"
            UPDATE job_initial_payments
            SET paid = TRUE, status = $2, updated_at = now()
            WHERE transaction_reference = $1 AND paid = FALSE
            RETURNING *
            "#,
        )
        .bind(reference)
        .bind(PaymentStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initiated,
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment status {0:?}")]
pub struct UnknownPaymentStatus(pub String);

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownPaymentStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "initiated" => Ok(PaymentStatus::Initiated),
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(UnknownPaymentStatus(value)),
        }
    }
}

/// Which side of the job submitted a completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Client,
    Technician,
}

impl Party {
    /// Column holding this party's half of a settlement record.
    pub fn state_column(&self) -> &'static str {
        match self {
            Party::Client => "client_state",
            Party::Technician => "technician_state",
        }
    }
}

/// One paired progress submission and the payout it produced, if any.
/// A state of zero means that side has not submitted yet.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IncrementalPayment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub technician_id: Uuid,
    pub client_state: BigDecimal,
    pub technician_state: BigDecimal,
    pub amount: BigDecimal,
    pub currency: String,
    pub paid: bool,
    pub transaction_reference: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IncrementalPayment {
    pub fn is_complete(&self) -> bool {
        let zero = BigDecimal::from(0_i64);
        self.client_state != zero && self.technician_state != zero
    }

    /// Idempotency key for the payout transfer. A repeated request with the
    /// same key cannot pay twice.
    pub fn transfer_reference(&self) -> String {
        format!("payout-{}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InitialPayment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub technician_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub paid: bool,
    pub transaction_reference: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BankAccount {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub bank_code: String,
    pub account_name: String,
    pub account_number: String,
    pub paystack_recipient_code: Option<String>,
    pub paystack_subaccount_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBankAccount {
    pub bank_code: String,
    pub account_name: String,
    pub account_number: String,
}

impl NewBankAccount {
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.bank_code.trim().is_empty() {
            out.push("bank_code is required".to_string());
        }
        if self.account_name.trim().is_empty() {
            out.push("account_name is required".to_string());
        }
        let number = self.account_number.trim();
        if number.len() != 10 || !number.chars().all(|c| c.is_ascii_digit()) {
            out.push("account_number must be a 10 digit NUBAN".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nuban_must_be_ten_digits() {
        let mut acct = NewBankAccount {
            bank_code: "058".into(),
            account_name: "Ada Obi".into(),
            account_number: "0123456789".into(),
        };
        assert!(acct.problems().is_empty());

        acct.account_number = "12345".into();
        assert_eq!(acct.problems().len(), 1);
    }

    #[test]
    fn status_column_values() {
        assert_eq!(
            PaymentStatus::try_from("completed".to_string()).unwrap(),
            PaymentStatus::Completed
        );
        assert!(PaymentStatus::try_from("paid".to_string()).is_err());
    }
}

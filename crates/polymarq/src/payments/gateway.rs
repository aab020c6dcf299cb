use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::PaystackConfig;
use crate::money::{Money, DEFAULT_CURRENCY};
use crate::payments::retry::{is_retryable_status, next_delay, RetryConfig};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("gateway declined the request: {0}")]
    Declined(String),

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::Status { status, .. } => is_retryable_status(*status),
            GatewayError::Declined(_) | GatewayError::Malformed(_) => false,
        }
    }
}

/// What a charge pays for. Encoded as the prefix of the charge reference so
/// the webhook can route the confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Tool,
    Job,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Tool => "tool",
            ItemType::Job => "job",
        }
    }

    pub fn reference(&self, id: Uuid) -> String {
        format!("{}-{}", self.as_str(), id)
    }

    pub fn from_reference(reference: &str) -> Option<Self> {
        match reference.split_once('-')?.0 {
            "tool" => Some(ItemType::Tool),
            "job" => Some(ItemType::Job),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeInit {
    pub status: bool,
    pub reference: String,
    pub authorization_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Sends `amount` from the platform balance to a transfer recipient.
    /// `reference` identifies the transfer, so a retried request is not paid
    /// twice. Returns the gateway's transfer reference.
    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: &Money,
        reason: &str,
        reference: &str,
    ) -> Result<String, GatewayError>;

    /// Starts a card charge split with the technician's subaccount.
    async fn initiate_charge(
        &self,
        payer_email: &str,
        amount: &Money,
        subaccount_code: &str,
        item_type: ItemType,
        reference_id: Uuid,
    ) -> Result<ChargeInit, GatewayError>;

    /// Returns the recipient code.
    async fn create_transfer_recipient(
        &self,
        name: &str,
        bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError>;

    /// Returns the subaccount code.
    async fn create_subaccount(
        &self,
        business_name: &str,
        bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError>;
}

pub type SharedGateway = Arc<dyn PaymentGateway>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    reference: Option<String>,
    transfer_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct SubaccountData {
    subaccount_code: String,
}

/// Paystack REST client.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    subaccount_percentage_fee: f64,
    retry: RetryConfig,
}

impl PaystackClient {
    pub fn new(cfg: &PaystackConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
            subaccount_percentage_fee: cfg.subaccount_percentage_fee,
            retry: RetryConfig {
                max_retries: cfg.max_retries,
                ..RetryConfig::default()
            },
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let mut retry_no = 0;

        loop {
            match self.post_once(&url, &body).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && retry_no < self.retry.max_retries => {
                    retry_no += 1;
                    let delay = {
                        let mut rng = StdRng::from_entropy();
                        next_delay(retry_no, &self.retry, &mut rng)
                    };
                    tracing::warn!(
                        path,
                        retry_no,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient gateway error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(url, status = %status, "gateway response");

        let envelope: Option<Envelope<T>> = serde_json::from_str(&text).ok();

        if !(status.is_success() || status.is_redirection()) {
            let message = envelope
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status_text(status));
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.ok_or_else(|| GatewayError::Malformed(text.clone()))?;
        if !envelope.status {
            return Err(GatewayError::Declined(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::Malformed(format!("missing data: {}", envelope.message)))
    }
}

fn transfer_body(
    recipient_code: &str,
    amount: &Money,
    reason: &str,
    reference: &str,
) -> serde_json::Value {
    json!({
        "source": "balance",
        "amount": amount.to_minor_units(),
        "currency": amount.currency,
        "recipient": recipient_code,
        "reason": reason,
        "reference": reference,
    })
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: &Money,
        reason: &str,
        reference: &str,
    ) -> Result<String, GatewayError> {
        let data: TransferData = self
            .post("/transfer", transfer_body(recipient_code, amount, reason, reference))
            .await?;

        data.reference
            .or(data.transfer_code)
            .ok_or_else(|| GatewayError::Malformed("transfer without reference".into()))
    }

    async fn initiate_charge(
        &self,
        payer_email: &str,
        amount: &Money,
        subaccount_code: &str,
        item_type: ItemType,
        reference_id: Uuid,
    ) -> Result<ChargeInit, GatewayError> {
        let data: ChargeData = self
            .post(
                "/transaction/initialize",
                json!({
                    "email": payer_email,
                    "amount": amount.to_minor_units(),
                    "currency": amount.currency,
                    "reference": item_type.reference(reference_id),
                    "subaccount": subaccount_code,
                }),
            )
            .await?;

        Ok(ChargeInit {
            status: true,
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    async fn create_transfer_recipient(
        &self,
        name: &str,
        bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError> {
        let data: RecipientData = self
            .post(
                "/transferrecipient",
                json!({
                    "type": "nuban",
                    "name": name,
                    "account_number": account_number,
                    "bank_code": bank_code,
                    "currency": DEFAULT_CURRENCY,
                }),
            )
            .await?;
        Ok(data.recipient_code)
    }

    async fn create_subaccount(
        &self,
        business_name: &str,
        bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError> {
        let data: SubaccountData = self
            .post(
                "/subaccount",
                json!({
                    "business_name": business_name,
                    "account_number": account_number,
                    "bank_code": bank_code,
                    "percentage_charge": self.subaccount_percentage_fee,
                }),
            )
            .await?;
        Ok(data.subaccount_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_carry_their_item_type() {
        let id = Uuid::new_v4();
        let r = ItemType::Job.reference(id);
        assert_eq!(r, format!("job-{id}"));
        assert_eq!(ItemType::from_reference(&r), Some(ItemType::Job));
        assert_eq!(ItemType::from_reference("tool-abc"), Some(ItemType::Tool));
        assert_eq!(ItemType::from_reference("rental-abc"), None);
        assert_eq!(ItemType::from_reference("job"), None);
    }

    #[test]
    fn only_network_and_server_side_failures_are_transient() {
        let throttled = GatewayError::Status {
            status: 429,
            message: "slow down".into(),
        };
        let bad_request = GatewayError::Status {
            status: 400,
            message: "invalid recipient".into(),
        };
        assert!(throttled.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!GatewayError::Declined("insufficient balance".into()).is_transient());
    }

    #[test]
    fn transfer_body_carries_the_idempotency_reference() {
        let amount = Money::from_f64(4_700.5, "NGN").unwrap();
        let body = transfer_body("RCP_1", &amount, "Polymarq payment", "payout-abc");
        assert_eq!(body["reference"], "payout-abc");
        assert_eq!(body["amount"], 470_050);
        assert_eq!(body["recipient"], "RCP_1");
        assert_eq!(body["source"], "balance");
    }

    #[test]
    fn envelope_parses_paystack_shape() {
        let body = r#"{"status":true,"message":"Transfer has been queued",
            "data":{"reference":"ref_1","transfer_code":"TRF_1","status":"success"}}"#;
        let env: Envelope<TransferData> = serde_json::from_str(body).unwrap();
        assert!(env.status);
        assert_eq!(env.data.unwrap().reference.as_deref(), Some("ref_1"));

        let declined = r#"{"status":false,"message":"Your balance is not enough"}"#;
        let env: Envelope<TransferData> = serde_json::from_str(declined).unwrap();
        assert!(!env.status);
        assert!(env.data.is_none());
    }
}

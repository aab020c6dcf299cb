use bigdecimal::BigDecimal;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::MarketError;
use crate::jobs::{JobStatus, JobsRepo};
use crate::money::{decimal_from_f64, decimal_to_f64, round2, Money};
use crate::notifications::{NotificationType, SharedNotifier};
use crate::payments::gateway::{ChargeInit, ItemType, SharedGateway};
use crate::payments::model::{
    BankAccount, IncrementalPayment, InitialPayment, NewBankAccount, Party,
};
use crate::payments::repo::PaymentsRepo;
use crate::payments::settlement::{transaction_cost, JobState, SettlementDecision};
use crate::payments::webhook::{verify_signature, WebhookEvent};
use crate::pings::PingsRepo;
use crate::users::User;

const CONFLICT_TITLE: &str = "Job State Resolution";
const CONFLICT_BODY: &str = "Your action is required to resolve a job progress state conflict. \
                             Kindly check your dashboard for more info.";

/// What happened to a submitted completion state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Waiting for the other party's half.
    Pending,
    /// The two halves disagree by more than the allowed gap.
    Conflict,
    /// Not enough combined progress to pay anything yet.
    Skipped,
    Paid {
        amount: f64,
        completion_state: f64,
        verified: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSubmission {
    pub payment: IncrementalPayment,
    #[serde(flatten)]
    pub outcome: SettlementOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitialPaymentCheckout {
    pub payment: InitialPayment,
    pub authorization_url: String,
}

#[derive(Clone)]
pub struct JobPaymentService {
    pool: PgPool,
    payments: PaymentsRepo,
    gateway: SharedGateway,
    notifier: SharedNotifier,
    webhook_secret: String,
}

impl JobPaymentService {
    pub fn new(
        pool: PgPool,
        gateway: SharedGateway,
        notifier: SharedNotifier,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            payments: PaymentsRepo::new(pool.clone()),
            pool,
            gateway,
            notifier,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Records one party's view of how far along the job is, and settles the
    /// record once both halves are in.
    ///
    /// Everything runs under the job row lock. A settlement that fails after
    /// the state was written (tiny fraction, nothing left to pay, missing
    /// bank details, refused transfer) rolls the write back too.
    pub async fn submit_state(
        &self,
        job_id: Uuid,
        user: &User,
        party: Party,
        state: f64,
    ) -> Result<StateSubmission, MarketError> {
        if !state.is_finite() {
            return Err(MarketError::invalid("job_state must be a number"));
        }
        // validate what gets stored: 0.00 means "not submitted"
        let state = round2(state);

        let mut tx = self.pool.begin().await?;

        let job = JobsRepo::lock(&mut tx, job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
        if job.status == JobStatus::Verified {
            return Err(MarketError::Conflict("Job has already been verified".into()));
        }
        let ping = PingsRepo::accepted_for_job(&mut tx, job.id)
            .await?
            .ok_or_else(|| {
                MarketError::NotFound("No accepted job request found for this job".into())
            })?;

        let allowed = match party {
            Party::Client => job.client_id == user.id,
            Party::Technician => ping.technician_id == user.id,
        };
        if !allowed {
            return Err(MarketError::Forbidden(
                "You are not a party to this job".into(),
            ));
        }

        let price_quote = decimal_to_f64(&ping.price_quote);
        let cost = match &ping.transaction_cost {
            Some(c) => decimal_to_f64(c),
            None => {
                let cost = {
                    let mut rng = StdRng::from_entropy();
                    transaction_cost(&mut rng, price_quote, job.duration)
                };
                let stored = decimal_from_f64(cost).map_err(|e| MarketError::Internal(e.into()))?;
                PingsRepo::set_transaction_cost(&mut tx, ping.id, &stored).await?;
                cost
            }
        };

        let paid = PaymentsRepo::paid_total(&mut tx, job.id).await?;
        let job_state = JobState {
            price_quote,
            transaction_cost: cost,
            total_amount_paid: decimal_to_f64(&paid),
            completion_state: job.completion(),
        };
        job_state.validate_completion_state(state)?;

        let state_dec = decimal_from_f64(state).map_err(|e| MarketError::invalid(e.to_string()))?;
        let record = match PaymentsRepo::latest_incomplete(&mut tx, job.id, party).await? {
            Some(open) => PaymentsRepo::fill_state(&mut tx, open.id, party, &state_dec).await?,
            None => {
                PaymentsRepo::insert_state(
                    &mut tx,
                    job.id,
                    job.client_id,
                    ping.technician_id,
                    &job.currency,
                    party,
                    &state_dec,
                )
                .await?
            }
        };

        if !record.is_complete() {
            tx.commit().await?;
            tracing::info!(job_id = %job.id, party = ?party, state, "completion state recorded");
            return Ok(StateSubmission {
                payment: record,
                outcome: SettlementOutcome::Pending,
            });
        }

        let client_state = decimal_to_f64(&record.client_state);
        let technician_state = decimal_to_f64(&record.technician_state);

        let payout = match job_state.settle(client_state, technician_state)? {
            SettlementDecision::Conflict => {
                tx.commit().await?;
                tracing::info!(
                    job_id = %job.id,
                    client_state,
                    technician_state,
                    "completion states conflict"
                );
                for recipient in [job.client_id, ping.technician_id] {
                    self.notifier
                        .send(
                            recipient,
                            NotificationType::Job,
                            CONFLICT_TITLE,
                            CONFLICT_BODY,
                            Some(json!({ "job_id": job.id, "payment_id": record.id })),
                        )
                        .await;
                }
                return Ok(StateSubmission {
                    payment: record,
                    outcome: SettlementOutcome::Conflict,
                });
            }
            SettlementDecision::Skipped => {
                tx.commit().await?;
                tracing::debug!(job_id = %job.id, "not enough progress for a payout");
                return Ok(StateSubmission {
                    payment: record,
                    outcome: SettlementOutcome::Skipped,
                });
            }
            SettlementDecision::Payout(p) => p,
        };

        let completion = decimal_from_f64(payout.completion_state)
            .map_err(|e| MarketError::Internal(e.into()))?;
        let status = if payout.verified {
            JobStatus::Verified
        } else {
            job.status
        };
        JobsRepo::set_completion(&mut tx, job.id, &completion, status).await?;

        let recipient = PaymentsRepo::bank_account_for(&mut tx, ping.technician_id)
            .await?
            .and_then(|a| a.paystack_recipient_code)
            .ok_or_else(|| MarketError::Dependency("Technician bank account not found".into()))?;

        let amount = Money::from_f64(payout.amount, job.currency.clone())
            .map_err(|e| MarketError::Internal(e.into()))?;
        let reference = self
            .gateway
            .initiate_transfer(
                &recipient,
                &amount,
                &format!("Polymarq payment for {}", job.name),
                &record.transfer_reference(),
            )
            .await
            .map_err(|e| {
                tracing::warn!(job_id = %job.id, error = %e, "payout transfer failed");
                MarketError::Dependency(format!("Payment transfer failed: {e}"))
            })?;

        let record = PaymentsRepo::mark_paid(&mut tx, record.id, &amount.amount, &reference).await?;
        tx.commit().await?;

        tracing::info!(
            job_id = %job.id,
            payment_id = %record.id,
            amount = payout.amount,
            completion_state = payout.completion_state,
            verified = payout.verified,
            "incremental payment settled"
        );

        self.notifier
            .send(
                ping.technician_id,
                NotificationType::Payment,
                "Job Payment",
                &format!("You have been paid {amount} for {}.", job.name),
                Some(json!({ "job_id": job.id, "payment_id": record.id })),
            )
            .await;

        Ok(StateSubmission {
            payment: record,
            outcome: SettlementOutcome::Paid {
                amount: payout.amount,
                completion_state: payout.completion_state,
                verified: payout.verified,
            },
        })
    }

    /// Incremental payments already paid out on the job.
    pub async fn list_payments(&self, job_id: Uuid) -> Result<Vec<IncrementalPayment>, MarketError> {
        let jobs = JobsRepo::new(self.pool.clone());
        if jobs.get(job_id).await?.is_none() {
            return Err(MarketError::NotFound("Job not found".into()));
        }
        Ok(self.payments.list_paid(job_id).await?)
    }

    /// Starts the client's upfront payment: half of the accepted quote,
    /// charged through the technician's subaccount.
    pub async fn initiate_initial_payment(
        &self,
        job_id: Uuid,
        client: &User,
    ) -> Result<InitialPaymentCheckout, MarketError> {
        let mut tx = self.pool.begin().await?;

        let job = JobsRepo::lock(&mut tx, job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
        if job.client_id != client.id {
            return Err(MarketError::Forbidden("You can only pay for your own jobs".into()));
        }
        let ping = PingsRepo::accepted_for_job(&mut tx, job.id)
            .await?
            .ok_or_else(|| {
                MarketError::NotFound("No accepted job request found for this job".into())
            })?;

        let half = (ping.price_quote.clone() / BigDecimal::from(2_i64)).round(2);
        let payment = PaymentsRepo::get_or_create_initial(
            &mut tx,
            job.id,
            client.id,
            ping.technician_id,
            &half,
            &ping.currency,
        )
        .await?;
        if payment.paid {
            return Err(MarketError::Conflict(
                "Initial payment for this job has already been made".into(),
            ));
        }

        let subaccount = PaymentsRepo::bank_account_for(&mut tx, ping.technician_id)
            .await?
            .and_then(|a| a.paystack_subaccount_code)
            .ok_or_else(|| MarketError::Dependency("Technician bank account not found".into()))?;

        let amount = Money::new(payment.amount.clone(), payment.currency.clone());
        let charge: ChargeInit = self
            .gateway
            .initiate_charge(&client.email, &amount, &subaccount, ItemType::Job, Uuid::new_v4())
            .await
            .map_err(|e| MarketError::Dependency(format!("Payment initialization failed: {e}")))?;

        let payment = PaymentsRepo::set_initial_reference(&mut tx, payment.id, &charge.reference).await?;
        tx.commit().await?;

        tracing::info!(
            job_id = %job.id,
            payment_id = %payment.id,
            reference = %charge.reference,
            "initial payment initiated"
        );

        Ok(InitialPaymentCheckout {
            payment,
            authorization_url: charge.authorization_url,
        })
    }

    /// Saves a technician's payout account and registers it with the gateway.
    /// Gateway failures leave the account saved without codes.
    pub async fn register_bank_account(
        &self,
        technician: &User,
        account: NewBankAccount,
    ) -> Result<BankAccount, MarketError> {
        let problems = account.problems();
        if !problems.is_empty() {
            return Err(MarketError::validation("Validation Error", problems));
        }

        let saved = self.payments.upsert_bank_account(technician.id, &account).await?;
        let name = if technician.full_name.trim().is_empty() {
            technician.username.as_str()
        } else {
            technician.full_name.as_str()
        };

        let recipient = match self
            .gateway
            .create_transfer_recipient(name, &saved.bank_code, &saved.account_number)
            .await
        {
            Ok(code) => Some(code),
            Err(e) => {
                tracing::warn!(technician_id = %technician.id, error = %e, "transfer recipient not created");
                None
            }
        };
        let subaccount = match self
            .gateway
            .create_subaccount(name, &saved.bank_code, &saved.account_number)
            .await
        {
            Ok(code) => Some(code),
            Err(e) => {
                tracing::warn!(technician_id = %technician.id, error = %e, "subaccount not created");
                None
            }
        };

        if recipient.is_none() && subaccount.is_none() {
            return Ok(saved);
        }
        let saved = self
            .payments
            .set_gateway_codes(saved.id, recipient.as_deref(), subaccount.as_deref())
            .await?;
        Ok(saved)
    }

    /// Handles a gateway delivery. Never fails: bad deliveries are logged and
    /// acknowledged so the gateway stops retrying them.
    pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) {
        if let Err(e) = verify_signature(&self.webhook_secret, body, signature) {
            tracing::warn!(error = %e, "rejected webhook delivery");
            return;
        }

        let event = match WebhookEvent::parse(body) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable webhook payload");
                return;
            }
        };
        if !event.is_successful_charge() {
            tracing::debug!(event = %event.event, "ignoring webhook event");
            return;
        }

        let reference = event.data.reference.as_str();
        match ItemType::from_reference(reference) {
            Some(ItemType::Job) => {
                match self.payments.mark_initial_paid_by_reference(reference).await {
                    Ok(Some(payment)) => {
                        tracing::info!(
                            job_id = %payment.job_id,
                            reference,
                            "initial payment confirmed"
                        );
                        self.notifier
                            .send(
                                payment.client_id,
                                NotificationType::Job,
                                "Job Initial Payment",
                                "A job initial payment has been made.",
                                Some(json!({ "job_id": payment.job_id, "payment_id": payment.id })),
                            )
                            .await;
                    }
                    Ok(None) => {
                        tracing::warn!(reference, "no unpaid initial payment for reference");
                    }
                    Err(e) => {
                        tracing::error!(reference, error = %e, "failed to confirm initial payment");
                    }
                }
            }
            Some(ItemType::Tool) => {
                tracing::info!(reference, "tool purchase charges are not handled here");
            }
            None => {
                tracing::warn!(reference, "invalid transaction reference");
            }
        }
    }
}

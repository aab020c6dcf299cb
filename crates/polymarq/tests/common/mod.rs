#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use polymarq::jobs::{Job, JobsRepo, NewJob};
use polymarq::money::Money;
use polymarq::notifications::{Notifier, NotificationType, SharedNotifier};
use polymarq::payments::{ChargeInit, GatewayError, ItemType, PaymentGateway, SharedGateway};
use polymarq::users::{NewUser, User, UsersRepo};

pub const LAGOS: (f64, f64) = (6.5244, 3.3792);
pub const ABUJA: (f64, f64) = (9.0765, 7.3986);

/// Migrated, empty database, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query(
        r#"
        TRUNCATE TABLE
            notifications,
            technician_bank_accounts,
            job_initial_payments,
            job_incremental_payments,
            job_price_quotations,
            pings,
            jobs,
            users
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(&pool)
    .await
    .expect("truncate failed");

    Some(pool)
}

pub async fn client(pool: &PgPool, name: &str, at: (f64, f64)) -> User {
    user(pool, name, true, false, Some(at)).await
}

pub async fn technician(pool: &PgPool, name: &str, at: (f64, f64)) -> User {
    user(pool, name, false, true, Some(at)).await
}

pub async fn user(
    pool: &PgPool,
    name: &str,
    is_client: bool,
    is_technician: bool,
    at: Option<(f64, f64)>,
) -> User {
    UsersRepo::new(pool.clone())
        .create(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            full_name: format!("{name} Full"),
            is_client,
            is_technician,
            latitude: at.map(|p| p.0),
            longitude: at.map(|p| p.1),
        })
        .await
        .expect("failed to create user")
}

pub async fn job(pool: &PgPool, client_id: Uuid, min: &str, max: &str) -> Job {
    JobsRepo::new(pool.clone())
        .create(
            client_id,
            NewJob {
                name: "Rewire living room".into(),
                description: "Replace old wiring".into(),
                location_address: "4 Adeola Odeku, Lagos".into(),
                min_price: BigDecimal::from_str(min).unwrap(),
                max_price: BigDecimal::from_str(max).unwrap(),
                currency: None,
                duration: 3,
                require_technicians_immediately: false,
                require_technicians_next_day: false,
            },
        )
        .await
        .expect("failed to create job")
}

pub async fn reload_job(pool: &PgPool, id: Uuid) -> Job {
    JobsRepo::new(pool.clone())
        .get(id)
        .await
        .unwrap()
        .expect("job vanished")
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub recipient_id: Uuid,
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: Option<Value>,
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<Sent>>,
}

impl FakeNotifier {
    pub fn shared() -> (Arc<FakeNotifier>, SharedNotifier) {
        let fake = Arc::new(FakeNotifier::default());
        let shared: SharedNotifier = fake.clone();
        (fake, shared)
    }

    pub fn titles_for(&self, recipient_id: Uuid) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.recipient_id == recipient_id)
            .map(|s| s.title.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        title: &str,
        body: &str,
        payload: Option<Value>,
    ) {
        self.sent.lock().unwrap().push(Sent {
            recipient_id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            payload,
        });
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub recipient_code: String,
    pub amount: Money,
    pub reason: String,
    pub reference: String,
}

#[derive(Default)]
pub struct FakeGateway {
    pub fail_transfers: AtomicBool,
    pub transfers: Mutex<Vec<Transfer>>,
    pub charges: Mutex<Vec<(String, Money, String)>>,
}

impl FakeGateway {
    pub fn shared() -> (Arc<FakeGateway>, SharedGateway) {
        let fake = Arc::new(FakeGateway::default());
        let shared: SharedGateway = fake.clone();
        (fake, shared)
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate_transfer(
        &self,
        recipient_code: &str,
        amount: &Money,
        reason: &str,
        reference: &str,
    ) -> Result<String, GatewayError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined("Your balance is not enough".into()));
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(Transfer {
            recipient_code: recipient_code.to_string(),
            amount: amount.clone(),
            reason: reason.to_string(),
            reference: reference.to_string(),
        });
        Ok(format!("TRF_{}", transfers.len()))
    }

    async fn initiate_charge(
        &self,
        payer_email: &str,
        amount: &Money,
        subaccount_code: &str,
        item_type: ItemType,
        reference_id: Uuid,
    ) -> Result<ChargeInit, GatewayError> {
        self.charges.lock().unwrap().push((
            payer_email.to_string(),
            amount.clone(),
            subaccount_code.to_string(),
        ));
        let reference = item_type.reference(reference_id);
        Ok(ChargeInit {
            status: true,
            authorization_url: format!("https://checkout.example/{reference}"),
            reference,
        })
    }

    async fn create_transfer_recipient(
        &self,
        _name: &str,
        _bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError> {
        Ok(format!("RCP_{account_number}"))
    }

    async fn create_subaccount(
        &self,
        _business_name: &str,
        _bank_code: &str,
        account_number: &str,
    ) -> Result<String, GatewayError> {
        Ok(format!("ACCT_{account_number}"))
    }
}

pub mod gateway;
pub mod model;
pub mod repo;
pub mod retry;
pub mod service;
pub mod settlement;
pub mod webhook;

pub use gateway::{ChargeInit, GatewayError, ItemType, PaymentGateway, PaystackClient, SharedGateway};
pub use model::{
    BankAccount, IncrementalPayment, InitialPayment, NewBankAccount, Party, PaymentStatus,
};
pub use repo::PaymentsRepo;
pub use service::{InitialPaymentCheckout, JobPaymentService, SettlementOutcome, StateSubmission};
pub use settlement::{JobState, Payout, SettlementDecision, StateCheck};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::models::{
    Counted, JobStateRequest, ListJobsQuery, ListJobsResponse, Message, NotificationsQuery,
    PageQuery, PingUpdateRequest, SearchQuery,
};
use crate::error::MarketError;
use crate::jobs::{Job, JobScope, JobUpdate, JobsRepo, NewJob};
use crate::notifications::{Notification, NotificationsRepo};
use crate::payments::{
    BankAccount, IncrementalPayment, InitialPaymentCheckout, JobPaymentService, NewBankAccount,
    Party, StateSubmission,
};
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::pings::{NewPing, Ping, PingReply, PingService};
use crate::pricing::{SearchOutcome, TechnicianSearch};
use crate::users::{Principal, UsersRepo};

pub mod auth;
pub mod error;
pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub users: UsersRepo,
    pub jobs: JobsRepo,
    pub pings: PingService,
    pub search: TechnicianSearch,
    pub payments: JobPaymentService,
    pub notifications: NotificationsRepo,
    pub default_page_size: i64,
}

impl ApiState {
    fn page_size(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default_page_size).clamp(1, 200)
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Jobs
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job).patch(update_job).delete(delete_job))
        .route("/jobs/:id/technicians", get(search_technicians))
        // Pings
        .route("/pings", post(create_ping))
        .route("/pings/requests", get(list_ping_requests))
        .route("/pings/:id", patch(respond_to_ping))
        // Payments
        .route("/jobs/:id/state/client", post(submit_client_state))
        .route("/jobs/:id/state/technician", post(submit_technician_state))
        .route("/jobs/:id/payments", get(list_job_payments))
        .route("/jobs/:id/initial-payment", post(initiate_initial_payment))
        .route("/bank-accounts", post(register_bank_account))
        .route("/webhooks/paystack", post(paystack_webhook))
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

// ----------------------------
// Jobs
// ----------------------------

pub async fn create_job(
    State(state): State<ApiState>,
    principal: Principal,
    Json(body): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), MarketError> {
    let client = principal.require_client()?;

    let problems = body.problems();
    if !problems.is_empty() {
        return Err(MarketError::validation("Validation Error", problems));
    }

    let job = state.jobs.create(client.id, body).await?;
    tracing::info!(job_id = %job.id, client_id = %client.id, "job created");
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    principal: Principal,
    Query(q): Query<ListJobsQuery>,
) -> Result<Json<ListJobsResponse>, MarketError> {
    let scope = match &principal {
        Principal::Anonymous => return Err(MarketError::Unauthorized),
        Principal::Technician(_) | Principal::Both(_) if q.open => JobScope::Open,
        Principal::Technician(u) => JobScope::Technician(u.id),
        Principal::Client(u) | Principal::Both(u) => JobScope::Client(u.id),
    };

    let items = state
        .jobs
        .list(scope, &q.filter(), state.page_size(q.limit), q.cursor())
        .await?;

    let (next_cursor_updated_at, next_cursor_id) = items
        .last()
        .map(|j| (Some(j.updated_at), Some(j.id)))
        .unwrap_or((None, None));

    Ok(Json(ListJobsResponse {
        items,
        next_cursor_updated_at,
        next_cursor_id,
    }))
}

pub async fn get_job(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, MarketError> {
    principal.require_user()?;
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
    Ok(Json(job))
}

/// Loads a job and checks the caller posted it.
async fn owned_job(state: &ApiState, principal: &Principal, id: Uuid) -> Result<Job, MarketError> {
    let client = principal.require_client()?;
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
    if job.client_id != client.id {
        return Err(MarketError::Forbidden("You can only modify your own jobs".into()));
    }
    Ok(job)
}

pub async fn update_job(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<JobUpdate>,
) -> Result<Json<Job>, MarketError> {
    let job = owned_job(&state, &principal, id).await?;

    let problems = body.problems(&job);
    if !problems.is_empty() {
        return Err(MarketError::validation("Validation Error", problems));
    }

    let job = state
        .jobs
        .update(job.id, body)
        .await?
        .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, MarketError> {
    let job = owned_job(&state, &principal, id).await?;
    if !state.jobs.soft_delete(job.id).await? {
        return Err(MarketError::NotFound("Job not found".into()));
    }
    tracing::info!(job_id = %job.id, "job deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_technicians(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchOutcome>, MarketError> {
    principal.require_user()?;
    let outcome = state
        .search
        .search(id, q.order, state.page_size(q.limit), q.page.unwrap_or(1))
        .await?;
    Ok(Json(outcome))
}

// ----------------------------
// Pings
// ----------------------------

pub async fn create_ping(
    State(state): State<ApiState>,
    principal: Principal,
    Json(body): Json<NewPing>,
) -> Result<(StatusCode, Json<Ping>), MarketError> {
    let client = principal.require_client()?;
    let ping = state.pings.create_ping(client, body).await?;
    Ok((StatusCode::CREATED, Json(ping)))
}

pub async fn respond_to_ping(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<PingUpdateRequest>,
) -> Result<Json<PingReply>, MarketError> {
    let technician = principal.require_technician()?;
    let reply = state.pings.respond(technician, id, body.status).await?;
    Ok(Json(reply))
}

pub async fn list_ping_requests(
    State(state): State<ApiState>,
    principal: Principal,
    Query(q): Query<PageQuery>,
) -> Result<Json<Counted<Ping>>, MarketError> {
    let technician = principal.require_technician()?;
    let (items, count) = state
        .pings
        .list_requests(technician, state.page_size(q.limit), q.page.unwrap_or(1))
        .await?;
    Ok(Json(Counted { count, items }))
}

// ----------------------------
// Payments
// ----------------------------

pub async fn submit_client_state(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<JobStateRequest>,
) -> Result<(StatusCode, Json<StateSubmission>), MarketError> {
    let client = principal.require_client()?;
    let out = state
        .payments
        .submit_state(id, client, Party::Client, body.job_state)
        .await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn submit_technician_state(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<JobStateRequest>,
) -> Result<(StatusCode, Json<StateSubmission>), MarketError> {
    let technician = principal.require_technician()?;
    let out = state
        .payments
        .submit_state(id, technician, Party::Technician, body.job_state)
        .await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn list_job_payments(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Counted<IncrementalPayment>>, MarketError> {
    principal.require_user()?;
    let items = state.payments.list_payments(id).await?;
    Ok(Json(Counted {
        count: items.len() as i64,
        items,
    }))
}

pub async fn initiate_initial_payment(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<InitialPaymentCheckout>), MarketError> {
    let client = principal.require_client()?;
    let checkout = state.payments.initiate_initial_payment(id, client).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

pub async fn register_bank_account(
    State(state): State<ApiState>,
    principal: Principal,
    Json(body): Json<NewBankAccount>,
) -> Result<(StatusCode, Json<BankAccount>), MarketError> {
    let technician = principal.require_technician()?;
    let account = state.payments.register_bank_account(technician, body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn paystack_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Message> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.payments.handle_webhook(&body, signature).await;
    Json(Message {
        message: "Webhook received successfully.",
    })
}

// ----------------------------
// Notifications
// ----------------------------

pub async fn list_notifications(
    State(state): State<ApiState>,
    principal: Principal,
    Query(q): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, MarketError> {
    let user = principal.require_user()?;
    let rows = state
        .notifications
        .list_for(
            user.id,
            state.page_size(q.limit),
            q.cursor_created_at.zip(q.cursor_id),
        )
        .await?;
    Ok(Json(rows))
}

pub async fn mark_notification_read(
    State(state): State<ApiState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, MarketError> {
    let user = principal.require_user()?;
    if !state.notifications.mark_read(id, user.id).await? {
        return Err(MarketError::NotFound("Notification not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

//! REST surface of the marketplace.
//!
//! Commands arrive already authenticated: the platform gateway injects
//! `x-actor-id`, `x-actor-role`, `x-actor-name`, and `x-actor-email`
//! headers, which the [`AuthenticatedActor`] extractor turns into the
//! core's `Actor`. Business errors map onto HTTP statuses per the market
//! error taxonomy.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::info;
use taskbay_market::{
    BidChanges, BidDraft, BidView, FeePolicyUpdate, GeoCircle, MarketCoordinator, MarketError,
    TaskChanges, TaskDraft, TaskPage, TaskQuery, TaskStatusFilter, TaskerBid,
};
use taskbay_types::{
    Actor, Amount, Bid, BidId, BidStatus, FeePolicyRecord, Notification, NotificationId, Review,
    Role, Task, TaskId, TaskStatus, UserId,
};

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<MarketCoordinator>,
    pub node_name: String,
    pub started_at: Instant,
}

type Rejection = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, Rejection>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Actor identity supplied by the upstream gateway.
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(&parts.headers, "x-actor-id")
            .ok_or_else(|| unauthorized("missing x-actor-id header"))?;
        let id = UserId::from_hex(&id).map_err(|_| unauthorized("malformed x-actor-id header"))?;

        let role = header_value(&parts.headers, "x-actor-role")
            .ok_or_else(|| unauthorized("missing x-actor-role header"))?;
        let role: Role = role.parse().map_err(|_| unauthorized("unknown actor role"))?;

        let name = header_value(&parts.headers, "x-actor-name").unwrap_or_default();
        let email = header_value(&parts.headers, "x-actor-email").unwrap_or_default();

        Ok(Self(Actor::new(id, role, name, email)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn unauthorized(message: &str) -> Rejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn market_error(err: MarketError) -> Rejection {
    let status = match &err {
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketError::InvalidState { .. } | MarketError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketError::Conflict(_) => StatusCode::CONFLICT,
        MarketError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_task_id(raw: &str) -> Result<TaskId, Rejection> {
    TaskId::from_hex(raw).map_err(|_| bad_request("malformed task id"))
}

fn parse_bid_id(raw: &str) -> Result<BidId, Rejection> {
    BidId::from_hex(raw).map_err(|_| bad_request("malformed bid id"))
}

fn parse_amount(value: f64, field: &str) -> Result<Amount, Rejection> {
    Amount::try_from_major_f64(value)
        .ok_or_else(|| bad_request(format!("{} must be a non-negative number", field)))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/tasks", post(create_task).get(list_tasks))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/assign", put(assign_task))
        .route("/tasks/:id/status", put(update_task_status))
        .route("/tasks/:id/start", put(start_task))
        .route("/tasks/:id/cancel", put(cancel_task))
        .route("/tasks/:id/request-completion", put(request_completion))
        .route("/tasks/:id/confirm-completion", put(confirm_completion))
        .route("/tasks/:id/reject-completion", put(reject_completion))
        .route("/tasks/:id/bids", get(list_task_bids))
        .route("/bids", post(place_bid))
        .route("/bids/mine", get(list_my_bids))
        .route("/bids/:id", put(update_bid).delete(delete_bid))
        .route("/bids/:id/accept", put(accept_bid))
        .route("/bids/:id/reject", put(reject_bid))
        .route("/bids/:id/cancel", put(cancel_bid))
        .route("/reviews", post(submit_review))
        .route("/taskers/:id/rating", get(tasker_rating))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", put(mark_notification_read))
        .route("/admin/fee-policy", get(get_fee_policy).post(update_fee_policy))
        .with_state(state)
}

/// Spawn the API server on the given address.
pub fn start_api_server(state: AppState, addr: String) -> JoinHandle<()> {
    let app = build_router(state);
    info!("📡 Starting API server on {}", addr);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind API server");
        axum::serve(listener, app).await.expect("API server failed");
    })
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct NodeStatus {
    name: String,
    version: &'static str,
    uptime_seconds: u64,
    tasks: usize,
    bids: usize,
    reviews: usize,
    notifications: usize,
}

async fn get_status(State(state): State<AppState>) -> ApiResult<NodeStatus> {
    let stats = state
        .market
        .storage_stats()
        .await
        .map_err(market_error)?;
    Ok(Json(NodeStatus {
        name: state.node_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        tasks: stats.task_count,
        bids: stats.bid_count,
        reviews: stats.review_count,
        notifications: stats.notification_count,
    }))
}

// --- Tasks ---

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    title: String,
    description: String,
    category: String,
    subcategory: Option<String>,
    address: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    required_at: DateTime<Utc>,
    duration_hours: u32,
    #[serde(default)]
    is_urgent: bool,
    #[serde(default)]
    images: Vec<String>,
    budget: f64,
}

async fn create_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    let draft = TaskDraft {
        title: req.title,
        description: req.description,
        category: req.category,
        subcategory: req.subcategory,
        address: req.address,
        latitude: req.latitude,
        longitude: req.longitude,
        required_at: req.required_at,
        duration_hours: req.duration_hours,
        is_urgent: req.is_urgent,
        images: req.images,
        budget: parse_amount(req.budget, "budget")?,
    };
    let task = state
        .market
        .lifecycle
        .create_task(&actor, draft)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct TasksQuery {
    keyword: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    status: Option<String>,
    is_urgent: Option<bool>,
    min_budget: Option<f64>,
    max_budget: Option<f64>,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    distance_km: Option<f64>,
    page: Option<usize>,
}

async fn list_tasks(
    State(state): State<AppState>,
    actor: Option<AuthenticatedActor>,
    Query(params): Query<TasksQuery>,
) -> ApiResult<TaskPage> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(raw.parse::<TaskStatus>().map_err(bad_request)?),
        None => None,
    };
    let near = match (params.latitude, params.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoCircle {
            latitude,
            longitude,
            radius_km: params.distance_km.unwrap_or(10.0),
        }),
        _ => None,
    };
    let query = TaskQuery {
        keyword: params.keyword,
        category: params.category,
        subcategory: params.subcategory,
        status,
        is_urgent: params.is_urgent,
        min_budget: params
            .min_budget
            .map(|b| parse_amount(b, "min_budget"))
            .transpose()?,
        max_budget: params
            .max_budget
            .map(|b| parse_amount(b, "max_budget"))
            .transpose()?,
        location: params.location,
        near,
        page: params.page.unwrap_or(1),
    };

    let requester = actor.as_ref().map(|a| &a.0);
    let page = state
        .market
        .search
        .search(&query, requester)
        .await
        .map_err(market_error)?;
    Ok(Json(page))
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .get_task(&task_id)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    required_at: Option<DateTime<Utc>>,
    duration_hours: Option<u32>,
    is_urgent: Option<bool>,
    images: Option<Vec<String>>,
    budget: Option<f64>,
}

async fn update_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let changes = TaskChanges {
        title: req.title,
        description: req.description,
        category: req.category,
        subcategory: req.subcategory.map(Some),
        address: req.address,
        latitude: req.latitude,
        longitude: req.longitude,
        required_at: req.required_at,
        duration_hours: req.duration_hours,
        is_urgent: req.is_urgent,
        images: req.images,
        budget: req.budget.map(|b| parse_amount(b, "budget")).transpose()?,
    };
    let task = state
        .market
        .lifecycle
        .update_task(&actor, &task_id, changes)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let task_id = parse_task_id(&id)?;
    state
        .market
        .lifecycle
        .delete_task(&actor, &task_id)
        .await
        .map_err(market_error)?;
    Ok(Json(MessageResponse {
        message: "task deleted".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct AssignTaskRequest {
    tasker: String,
}

async fn assign_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<AssignTaskRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let tasker = UserId::from_hex(&req.tasker).map_err(|_| bad_request("malformed tasker id"))?;
    let task = state
        .market
        .lifecycle
        .assign_task(&actor, &task_id, tasker)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskStatusRequest {
    status: String,
    note: Option<String>,
    feedback: Option<String>,
    reason: Option<String>,
}

/// Generic status endpoint: dispatches the requested target status onto
/// the corresponding lifecycle operation. Anything outside the
/// transition table fails there.
async fn update_task_status(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let target = req.status.parse::<TaskStatus>().map_err(bad_request)?;
    let lifecycle = &state.market.lifecycle;
    let current = lifecycle.get_task(&task_id).await.map_err(market_error)?.status;
    let task = match target {
        // From CompletionRequested, moving back to InProgress is the
        // customer rejecting the completion request; from Assigned it is
        // the tasker starting work.
        TaskStatus::InProgress if current == TaskStatus::CompletionRequested => {
            lifecycle.reject_completion(&actor, &task_id, req.reason).await
        }
        TaskStatus::InProgress => lifecycle.start_task(&actor, &task_id).await,
        TaskStatus::CompletionRequested => {
            lifecycle
                .request_completion(&actor, &task_id, req.note, req.feedback)
                .await
        }
        TaskStatus::Completed => lifecycle.confirm_completion(&actor, &task_id, req.feedback).await,
        TaskStatus::Cancelled => lifecycle.cancel_task(&actor, &task_id).await,
        TaskStatus::Open | TaskStatus::Assigned => Err(MarketError::Validation(format!(
            "cannot set status to {} directly",
            target
        ))),
    }
    .map_err(market_error)?;
    Ok(Json(task))
}

async fn start_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .start_task(&actor, &task_id)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

async fn cancel_task(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .cancel_task(&actor, &task_id)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize, Default)]
struct RequestCompletionRequest {
    note: Option<String>,
    feedback: Option<String>,
}

async fn request_completion(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<RequestCompletionRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .request_completion(&actor, &task_id, req.note, req.feedback)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize, Default)]
struct ConfirmCompletionRequest {
    feedback: Option<String>,
}

async fn confirm_completion(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<ConfirmCompletionRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .confirm_completion(&actor, &task_id, req.feedback)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize, Default)]
struct RejectCompletionRequest {
    reason: Option<String>,
}

async fn reject_completion(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<RejectCompletionRequest>,
) -> ApiResult<Task> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .market
        .lifecycle
        .reject_completion(&actor, &task_id, req.reason)
        .await
        .map_err(market_error)?;
    Ok(Json(task))
}

// --- Bids ---

#[derive(Debug, Deserialize)]
struct PlaceBidRequest {
    task: String,
    amount: f64,
    #[serde(default)]
    message: String,
    estimated_hours: Option<u32>,
}

async fn place_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<PlaceBidRequest>,
) -> ApiResult<Bid> {
    let draft = BidDraft {
        task: parse_task_id(&req.task)?,
        amount: parse_amount(req.amount, "amount")?,
        message: req.message,
        estimated_hours: req.estimated_hours,
    };
    let bid = state
        .market
        .bids
        .place_bid(&actor, draft)
        .await
        .map_err(market_error)?;
    Ok(Json(bid))
}

async fn list_task_bids(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<Vec<BidView>> {
    let task_id = parse_task_id(&id)?;
    let bids = state
        .market
        .bids
        .bids_for_task(&actor, &task_id)
        .await
        .map_err(market_error)?;
    Ok(Json(bids))
}

#[derive(Debug, Deserialize)]
struct MyBidsQuery {
    /// Comma-separated bid statuses, e.g. `pending,accepted`.
    status: Option<String>,
    /// Parent-task status, optionally negated with a leading `!`,
    /// e.g. `open` or `!open`.
    task_status: Option<String>,
}

async fn list_my_bids(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<MyBidsQuery>,
) -> ApiResult<Vec<TaskerBid>> {
    let statuses = match params.status.as_deref() {
        Some(raw) => {
            let mut parsed = Vec::new();
            for part in raw.split(',').filter(|p| !p.is_empty()) {
                let status = match part {
                    "pending" => BidStatus::Pending,
                    "accepted" => BidStatus::Accepted,
                    "rejected" => BidStatus::Rejected,
                    "cancelled" => BidStatus::Cancelled,
                    other => return Err(bad_request(format!("unknown bid status: {}", other))),
                };
                parsed.push(status);
            }
            Some(parsed)
        }
        None => None,
    };

    let task_status = match params.task_status.as_deref() {
        Some(raw) => {
            let (raw, negate) = match raw.strip_prefix('!') {
                Some(rest) => (rest, true),
                None => (raw, false),
            };
            let status = raw.parse::<TaskStatus>().map_err(bad_request)?;
            Some(TaskStatusFilter { status, negate })
        }
        None => None,
    };

    let bids = state
        .market
        .bids
        .bids_for_tasker(&actor, statuses.as_deref(), task_status)
        .await
        .map_err(market_error)?;
    Ok(Json(bids))
}

#[derive(Debug, Deserialize)]
struct UpdateBidRequest {
    amount: Option<f64>,
    message: Option<String>,
    estimated_hours: Option<u32>,
}

async fn update_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<UpdateBidRequest>,
) -> ApiResult<Bid> {
    let bid_id = parse_bid_id(&id)?;
    let changes = BidChanges {
        amount: req.amount.map(|a| parse_amount(a, "amount")).transpose()?,
        message: req.message,
        estimated_hours: req.estimated_hours.map(Some),
    };
    let bid = state
        .market
        .bids
        .update_bid(&actor, &bid_id, changes)
        .await
        .map_err(market_error)?;
    Ok(Json(bid))
}

async fn delete_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let bid_id = parse_bid_id(&id)?;
    state
        .market
        .bids
        .delete_bid(&actor, &bid_id)
        .await
        .map_err(market_error)?;
    Ok(Json(MessageResponse {
        message: "bid deleted".to_string(),
    }))
}

async fn accept_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let bid_id = parse_bid_id(&id)?;
    let (bid, task) = state
        .market
        .bids
        .accept_bid(&actor, &bid_id)
        .await
        .map_err(market_error)?;
    Ok(Json(serde_json::json!({ "bid": bid, "task": task })))
}

#[derive(Debug, Deserialize, Default)]
struct RejectBidRequest {
    reason: Option<String>,
}

async fn reject_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    Json(req): Json<RejectBidRequest>,
) -> ApiResult<Bid> {
    let bid_id = parse_bid_id(&id)?;
    let bid = state
        .market
        .bids
        .reject_bid(&actor, &bid_id, req.reason)
        .await
        .map_err(market_error)?;
    Ok(Json(bid))
}

async fn cancel_bid(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<Bid> {
    let bid_id = parse_bid_id(&id)?;
    let bid = state
        .market
        .bids
        .cancel_bid(&actor, &bid_id)
        .await
        .map_err(market_error)?;
    Ok(Json(bid))
}

// --- Reviews ---

#[derive(Debug, Deserialize)]
struct SubmitReviewRequest {
    tasker: String,
    task: String,
    rating: u8,
    comment: Option<String>,
}

async fn submit_review(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<SubmitReviewRequest>,
) -> ApiResult<Review> {
    let tasker = UserId::from_hex(&req.tasker).map_err(|_| bad_request("malformed tasker id"))?;
    let task_id = parse_task_id(&req.task)?;
    let review = state
        .market
        .reviews
        .submit_review(&actor, tasker, &task_id, req.rating, req.comment)
        .await
        .map_err(market_error)?;
    Ok(Json(review))
}

#[derive(Serialize)]
struct TaskerRatingResponse {
    tasker: String,
    completed_tasks: u64,
    average_rating: f64,
    total_reviews: u64,
    distribution: [u64; 5],
}

async fn tasker_rating(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TaskerRatingResponse> {
    let tasker = UserId::from_hex(&id).map_err(|_| bad_request("malformed tasker id"))?;
    let profile = state
        .market
        .reviews
        .profile_for(&tasker)
        .await
        .map_err(market_error)?;
    let stats = state
        .market
        .reviews
        .rating_for(&tasker)
        .await
        .map_err(market_error)?;
    Ok(Json(TaskerRatingResponse {
        tasker: tasker.to_hex(),
        completed_tasks: profile.completed_tasks,
        average_rating: stats.average_rating,
        total_reviews: stats.total_reviews,
        distribution: stats.distribution,
    }))
}

// --- Notifications ---

async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> ApiResult<Vec<Notification>> {
    let notifications = state
        .market
        .notifications
        .for_user(&actor.id)
        .await
        .map_err(market_error)?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> ApiResult<Notification> {
    let notification_id =
        NotificationId::from_hex(&id).map_err(|_| bad_request("malformed notification id"))?;
    let notification = state
        .market
        .notifications
        .mark_read(&actor.id, &notification_id)
        .await
        .map_err(market_error)?;
    Ok(Json(notification))
}

// --- Fee policy ---

#[derive(Serialize)]
struct FeePolicyResponse {
    current: FeePolicyRecord,
    history: Vec<FeePolicyRecord>,
}

async fn get_fee_policy(State(state): State<AppState>) -> ApiResult<FeePolicyResponse> {
    let current = state.market.fees.current().await.map_err(market_error)?;
    let history = state.market.fees.history().await.map_err(market_error)?;
    Ok(Json(FeePolicyResponse { current, history }))
}

#[derive(Debug, Deserialize)]
struct UpdateFeePolicyRequest {
    platform_fee_percent: f64,
    commission_percent: f64,
    trust_and_support_fee: f64,
}

async fn update_fee_policy(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(req): Json<UpdateFeePolicyRequest>,
) -> ApiResult<FeePolicyRecord> {
    let update = FeePolicyUpdate {
        platform_fee_percent: req.platform_fee_percent,
        commission_percent: req.commission_percent,
        trust_and_support_fee: parse_amount(req.trust_and_support_fee, "trust_and_support_fee")?,
    };
    let record = state
        .market
        .fees
        .update(update, &actor)
        .await
        .map_err(market_error)?;
    Ok(Json(record))
}

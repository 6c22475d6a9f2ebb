// region:    --- Imports
use crate::bidding::commands::{
    handle_advance_clock, handle_create_auction, handle_place_bid, handle_register_user,
    AdvanceClockCommand, CreateAuctionCommand, PlaceBidCommand, RegisterUserCommand,
};
use crate::error::{StoreError, Violation, WriteError};
use crate::gateway::WriteGateway;
use crate::ingest::{self, SeedBatch};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

// endregion: --- Imports

type AppState = State<Arc<WriteGateway>>;

// region:    --- Router
pub fn routes(gateway: Arc<WriteGateway>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/users", post(handle_register))
        .route("/users/:id", get(handle_get_user))
        .route("/auctions", post(handle_create).get(handle_get_auctions))
        .route("/auction/:id", get(handle_get_auction))
        .route("/auction/:id/bids", get(handle_get_bid_history))
        .route("/auction/:id/highest-bid", get(handle_get_highest_bid))
        .route("/auction/:id/audit", get(handle_audit_auction))
        .route("/bid", post(handle_bid))
        .route("/clock", get(handle_get_clock).post(handle_advance))
        .route("/seed", post(handle_seed))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20))
        .with_state(gateway)
}
// endregion: --- Router

// region:    --- Error Responses
fn violation_status(violation: &Violation) -> StatusCode {
    match violation {
        Violation::UnknownReference { .. } => StatusCode::NOT_FOUND,
        Violation::DuplicateIdentifier { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn store_error_response(e: StoreError) -> Response {
    error!("{:<12} --> store error: {}", "Handler", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string(), "code": "STORE_ERROR"})),
    )
        .into_response()
}

fn not_found(what: &str, id: impl std::fmt::Display) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("{what} {id} not found"), "code": "NOT_FOUND"})),
    )
        .into_response()
}

/// Malformed or mistyped request bodies, in the same shape as write errors.
fn rejection_response(rejection: JsonRejection) -> Response {
    warn!("{:<12} --> bad request body: {}", "Handler", rejection.body_text());
    (
        rejection.status(),
        Json(serde_json::json!({
            "error": rejection.body_text(),
            "code": "INVALID_REQUEST_BODY",
        })),
    )
        .into_response()
}

impl IntoResponse for WriteError {
    fn into_response(self) -> Response {
        match self {
            WriteError::Violation(violation) => (
                violation_status(&violation),
                Json(serde_json::json!({
                    "error": violation.to_string(),
                    "code": violation.code(),
                    "detail": violation,
                })),
            )
                .into_response(),
            WriteError::Store(e) => store_error_response(e),
        }
    }
}
// endregion: --- Error Responses

// region:    --- Command Handlers

/// Bid placement
pub async fn handle_bid(
    State(gateway): AppState,
    payload: Result<Json<PlaceBidCommand>, JsonRejection>,
) -> Response {
    let Json(cmd) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match handle_place_bid(cmd, &gateway).await {
        Ok(bid) => (StatusCode::OK, Json(bid)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// User registration
pub async fn handle_register(
    State(gateway): AppState,
    payload: Result<Json<RegisterUserCommand>, JsonRejection>,
) -> Response {
    let Json(cmd) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match handle_register_user(cmd, &gateway).await {
        Ok(registration) if registration.created => {
            (StatusCode::CREATED, Json(registration.user)).into_response()
        }
        Ok(registration) => (StatusCode::OK, Json(registration.user)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Auction creation
pub async fn handle_create(
    State(gateway): AppState,
    payload: Result<Json<CreateAuctionCommand>, JsonRejection>,
) -> Response {
    let Json(cmd) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match handle_create_auction(cmd, &gateway).await {
        Ok(auction) => (StatusCode::CREATED, Json(auction)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Clock advance
pub async fn handle_advance(
    State(gateway): AppState,
    payload: Result<Json<AdvanceClockCommand>, JsonRejection>,
) -> Response {
    let Json(cmd) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match handle_advance_clock(cmd, &gateway).await {
        Ok(advance) => (StatusCode::OK, Json(advance)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Bulk seed
pub async fn handle_seed(
    State(gateway): AppState,
    payload: Result<Json<SeedBatch>, JsonRejection>,
) -> Response {
    let Json(batch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match ingest::load_batch(&gateway, batch).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// User lookup
pub async fn handle_get_user(State(gateway): AppState, Path(user_id): Path<String>) -> Response {
    info!("{:<12} --> user id: {}", "HandlerQuery", user_id);
    match gateway.user(&user_id).await {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => not_found("user", user_id),
        Err(e) => store_error_response(e),
    }
}

/// All auctions
pub async fn handle_get_auctions(State(gateway): AppState) -> Response {
    info!("{:<12} --> all auctions", "HandlerQuery");
    match gateway.auctions().await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Auction with derived status
pub async fn handle_get_auction(State(gateway): AppState, Path(auction_id): Path<i64>) -> Response {
    info!("{:<12} --> auction id: {}", "HandlerQuery", auction_id);
    match gateway.auction(auction_id).await {
        Ok(Some(view)) => Json(view).into_response(),
        Ok(None) => not_found("auction", auction_id),
        Err(e) => store_error_response(e),
    }
}

/// Highest bid
pub async fn handle_get_highest_bid(
    State(gateway): AppState,
    Path(auction_id): Path<i64>,
) -> Response {
    info!("{:<12} --> highest bid id: {}", "HandlerQuery", auction_id);
    match gateway.highest_bid(auction_id).await {
        Ok(Some(highest_bid)) => Json(highest_bid).into_response(),
        Ok(None) => not_found("auction", auction_id),
        Err(e) => store_error_response(e),
    }
}

/// Bid history
pub async fn handle_get_bid_history(
    State(gateway): AppState,
    Path(auction_id): Path<i64>,
) -> Response {
    info!("{:<12} --> bid history id: {}", "HandlerQuery", auction_id);
    match gateway.bids(auction_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Aggregate audit
pub async fn handle_audit_auction(
    State(gateway): AppState,
    Path(auction_id): Path<i64>,
) -> Response {
    info!("{:<12} --> audit id: {}", "HandlerQuery", auction_id);
    match gateway.audit_auction(auction_id).await {
        Ok(Some(audit)) => Json(audit).into_response(),
        Ok(None) => not_found("auction", auction_id),
        Err(e) => store_error_response(e),
    }
}

/// Current pseudo time
pub async fn handle_get_clock(State(gateway): AppState) -> Response {
    match gateway.now().await {
        Ok(now) => Json(serde_json::json!({ "now": now })).into_response(),
        Err(e) => store_error_response(e),
    }
}

// endregion: --- Query Handlers

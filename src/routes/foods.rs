use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::STATUS_AVAILABLE, SortKey};
use crate::AppState;

// Fields a request-status update is allowed to touch.
const REQUEST_FIELDS: &[&str] = &["foodStatus", "requestDate", "additionalNotes"];

// Fields the owner's detail edit is allowed to touch.
const DETAIL_FIELDS: &[&str] = &[
    "foodName",
    "foodImage",
    "pickupLocation",
    "foodQuantity",
    "additionalNotes",
    "expiredDateTime",
];

#[derive(Deserialize)]
pub struct SearchParams {
    search: Option<String>,
}

#[derive(Deserialize)]
pub struct EmailParams {
    email: Option<String>,
}

pub async fn available_foods(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_available(&state.db).await {
        Ok(foods) => AxumJson(foods).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn available_foods_sorted(
    Path(sort): Path<String>,
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(key) = SortKey::parse(&sort) else {
        return (StatusCode::BAD_REQUEST, "Unsupported sort key").into_response();
    };
    let search = params.search.unwrap_or_default();
    match db::list_available_sorted(&state.db, key, &search).await {
        Ok(foods) => AxumJson(foods).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn top_foods(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_top_by_quantity(&state.db, 6).await {
        Ok(foods) => AxumJson(foods).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn email_foods(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<EmailParams>,
) -> impl IntoResponse {
    let email = params.email.unwrap_or_default();
    if user.email != email {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    match db::list_by_donator(&state.db, &email).await {
        Ok(foods) => AxumJson(foods).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn food_by_id(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::get_food(&state.db, &id).await {
        // A missing record serializes as JSON null, matching the lookup result.
        Ok(food) => AxumJson(food).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_food(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(food): Json<Map<String, Value>>,
) -> impl IntoResponse {
    match db::insert_food(&state.db, food).await {
        Ok(ack) => AxumJson(ack).into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn request_food(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<Map<String, Value>>,
) -> impl IntoResponse {
    let patch = pick(&body, REQUEST_FIELDS);
    match db::patch_food(&state.db, &id, &patch).await {
        Ok(ack) => AxumJson(ack).into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn requested_foods(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::list_requested(&state.db).await {
        Ok(foods) => AxumJson(foods).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_food(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<Map<String, Value>>,
) -> impl IntoResponse {
    let patch = pick(&body, DETAIL_FIELDS);
    match db::patch_food(&state.db, &id, &patch).await {
        Ok(ack) => AxumJson(ack).into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn delete_food(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::delete_food(&state.db, &id).await {
        Ok(ack) => AxumJson(ack).into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn cancel_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let mut patch = Map::new();
    patch.insert("foodStatus".to_string(), Value::from(STATUS_AVAILABLE));
    match db::patch_food(&state.db, &id, &patch).await {
        Ok(ack) => AxumJson(ack).into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

fn pick(body: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut picked = Map::new();
    for key in keys {
        if let Some(value) = body.get(*key) {
            picked.insert((*key).to_string(), value.clone());
        }
    }
    picked
}

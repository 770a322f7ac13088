use axum::{
    routing::{get, post, put},
    Router,
};

pub mod auth;
pub mod db;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(greeting))
        // Auth
        .route("/jwt", post(auth::issue_token))
        .route("/logout", post(auth::logout))
        // Public listings
        .route("/availableFoods", get(routes::foods::available_foods))
        .route(
            "/availableFoodsSort/{sort}",
            get(routes::foods::available_foods_sorted),
        )
        // Per-user and record-level operations
        .route(
            "/foods",
            get(routes::foods::top_foods).post(routes::foods::create_food),
        )
        .route("/emailFoods", get(routes::foods::email_foods))
        .route(
            "/foods/{id}",
            get(routes::foods::food_by_id).put(routes::foods::request_food),
        )
        .route(
            "/requestedFoods",
            get(routes::foods::requested_foods),
        )
        .route("/requestedFoods/{id}", put(routes::foods::cancel_request))
        .route(
            "/food/{id}",
            put(routes::foods::update_food).delete(routes::foods::delete_food),
        )
        .with_state(state)
}

async fn greeting() -> &'static str {
    "Food sharing server is running"
}

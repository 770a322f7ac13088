use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use foodshare::{app, db, AppState};

const SECRET: &str = "integration-test-secret";

async fn test_app() -> Router {
    std::env::set_var("JWT_SECRET", SECRET);
    let pool = db::connect("sqlite::memory:").await.expect("connect");
    app(AppState { db: pool })
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn send_json(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Logs in and returns the `token=...` cookie pair from Set-Cookie.
async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(send_json("POST", "/jwt", None, json!({ "email": email })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie string")
        .to_string();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

#[tokio::test]
async fn greeting_is_public() {
    let app = test_app().await;
    let response = app.oneshot(get("/", None)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = test_app().await;
    let response = app
        .oneshot(send_json("POST", "/logout", None, json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie string");
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_bad_tokens() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(get("/foods/some-id", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get("/foods/some-id", Some("token=not-a-jwt")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_listing_rejects_other_identities() {
    let app = test_app().await;
    let cookie = login(&app, "a@x.com").await;

    let response = app
        .clone()
        .oneshot(get("/emailFoods?email=b@y.com", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get("/emailFoods?email=a@x.com", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn unknown_sort_key_is_a_bad_request() {
    let app = test_app().await;
    let response = app
        .oneshot(get("/availableFoodsSort/bogus", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn donation_request_and_cancel_flow() {
    let app = test_app().await;
    let cookie = login(&app, "a@x.com").await;

    // Donate.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/foods",
            Some(&cookie),
            json!({
                "foodName": "Bread",
                "foodQuantity": 5,
                "foodStatus": "available",
                "donatorEmail": "a@x.com",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["acknowledged"], true);
    let id = ack["insertedId"].as_str().expect("insertedId").to_string();

    // Publicly listed while available.
    let response = app
        .clone()
        .oneshot(get("/availableFoods", None))
        .await
        .expect("response");
    let listed = body_json(response).await;
    assert!(listed
        .as_array()
        .expect("array")
        .iter()
        .any(|f| f["_id"] == id.as_str()));

    // Claim it.
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/foods/{}", id),
            Some(&cookie),
            json!({
                "foodStatus": "requested",
                "requestDate": "2024-01-01",
                "additionalNotes": "n",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["matchedCount"], 1);

    let response = app
        .clone()
        .oneshot(get("/requestedFoods", Some(&cookie)))
        .await
        .expect("response");
    let requested = body_json(response).await;
    let entry = requested
        .as_array()
        .expect("array")
        .iter()
        .find(|f| f["_id"] == id.as_str())
        .expect("requested record")
        .clone();
    assert_eq!(entry["requestDate"], "2024-01-01");
    assert_eq!(entry["additionalNotes"], "n");

    // Cancel the request.
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/requestedFoods/{}", id),
            Some(&cookie),
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/foods/{}", id), Some(&cookie)))
        .await
        .expect("response");
    let food = body_json(response).await;
    assert_eq!(food["foodStatus"], "available");

    // Remove the listing.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/food/{}", id))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["deletedCount"], 1);

    // Lookup of the deleted record reads back as JSON null.
    let response = app
        .oneshot(get(&format!("/foods/{}", id), Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.is_null());
}

#[tokio::test]
async fn detail_update_replaces_only_the_editable_fields() {
    let app = test_app().await;
    let cookie = login(&app, "a@x.com").await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/foods",
            Some(&cookie),
            json!({
                "foodName": "Rice",
                "foodQuantity": 2,
                "foodStatus": "available",
                "donatorEmail": "a@x.com",
            }),
        ))
        .await
        .expect("response");
    let ack = body_json(response).await;
    let id = ack["insertedId"].as_str().expect("insertedId").to_string();

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/food/{}", id),
            Some(&cookie),
            json!({
                "foodName": "Fried Rice",
                "foodQuantity": 3,
                "donatorEmail": "intruder@z.com",
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/foods/{}", id), Some(&cookie)))
        .await
        .expect("response");
    let food = body_json(response).await;
    assert_eq!(food["foodName"], "Fried Rice");
    assert_eq!(food["foodQuantity"], 3);
    // Ownership is not an editable detail field.
    assert_eq!(food["donatorEmail"], "a@x.com");
}

use std::env;
use std::future::Future;

use axum::{
    extract::{FromRequestParts, Json},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const SESSION_COOKIE_NAME: &str = "token";

// Claims carried in the session token: whatever the login payload contained,
// plus the expiry. Only `email` is interpreted server-side.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    email: String,
    exp: usize,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Verified session identity, extracted from the `token` cookie.
pub struct AuthenticatedUser {
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token(parts)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let secret = env::var("JWT_SECRET").map_err(|_| {
                tracing::error!("JWT_SECRET not set");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            })?;

            let claims = decode_claims(&token, &secret).map_err(|e| {
                tracing::warn!("Token rejected: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            })?;

            Ok(AuthenticatedUser {
                email: claims.email,
            })
        }
    }
}

pub async fn issue_token(Json(identity): Json<Map<String, Value>>) -> impl IntoResponse {
    let secret = match env::var("JWT_SECRET") {
        Ok(s) => s,
        Err(_) => {
            tracing::error!("JWT_SECRET not set");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
                .into_response();
        }
    };

    match create_jwt(&identity, &secret) {
        Ok(token) => {
            let cookie = build_session_cookie(&token, is_production());
            let mut response = Json(json!({ "success": true })).into_response();
            response
                .headers_mut()
                .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
            response
        }
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to create token").into_response()
        }
    }
}

pub async fn logout() -> impl IntoResponse {
    let cookie = clear_session_cookie(is_production());
    let mut response = Json(json!({ "success": true })).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

fn create_jwt(identity: &Map<String, Value>, secret: &str) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(1))
        .expect("valid timestamp")
        .timestamp();

    let mut claims = identity.clone();
    claims.insert("exp".to_string(), Value::from(expiration));

    let token = encode(
        &Header::default(),
        &Value::Object(claims),
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

fn decode_claims(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;
    Ok(data.claims)
}

fn extract_token(parts: &Parts) -> Option<String> {
    let cookie_header = parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())?;
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some((k, v)) = cookie.split_once('=') {
            if k == SESSION_COOKIE_NAME {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn is_production() -> bool {
    env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production"
}

// The client is served cross-site in production, so the cookie needs
// SameSite=None there; local development stays strict and insecure.
fn build_session_cookie(token: &str, production: bool) -> String {
    if production {
        format!(
            "{}={}; HttpOnly; SameSite=None; Secure; Path=/; Max-Age=3600",
            SESSION_COOKIE_NAME, token
        )
    } else {
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=3600",
            SESSION_COOKIE_NAME, token
        )
    }
}

fn clear_session_cookie(production: bool) -> String {
    if production {
        format!(
            "{}=; HttpOnly; SameSite=None; Secure; Path=/; Max-Age=0",
            SESSION_COOKIE_NAME
        )
    } else {
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
            SESSION_COOKIE_NAME
        )
    }
}

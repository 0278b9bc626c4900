use actix_web::{web, HttpResponse};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::auth::Claims;
use crate::models::user::User;
use crate::AppState;

/// Out of core scope (spec §1 — auth is glue); kept in the teacher's
/// thin `Result<T, String>` / `actix_web::Error` style rather than the
/// core's `ActivityError` taxonomy (SPEC_FULL §2.2).
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/register").route(web::post().to(register)))
        .service(web::resource("/auth/login").route(web::post().to(login)));
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
    organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: Uuid,
}

async fn register(state: web::Data<AppState>, body: web::Json<RegisterRequest>) -> actix_web::Result<HttpResponse> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(body.password.as_bytes(), &salt)
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .to_string();

    let user = sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (id, email, password_hash, name, role, organization_id, created_at)
        VALUES ($1, $2, $3, $4, 'member', $5, NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(&body.email)
    .bind(&password_hash)
    .bind(&body.name)
    .bind(body.organization_id)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    let token = issue_token(&user)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id: user.id }))
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> actix_web::Result<HttpResponse> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("invalid credentials"))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
    Argon2::default()
        .verify_password(body.password.as_bytes(), &parsed_hash)
        .map_err(|_| actix_web::error::ErrorUnauthorized("invalid credentials"))?;

    let token = issue_token(&user)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id: user.id }))
}

fn issue_token(user: &User) -> actix_web::Result<String> {
    let jwt_secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "default-secret-change-in-production".to_string());
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id.to_string(),
        workspace_id: Some(user.organization_id.to_string()),
        role: user.role.clone(),
        iat: Utc::now().timestamp() as usize,
        exp: (Utc::now().timestamp() + 7 * 24 * 3_600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_bytes()))
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))
}

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{role::Role, user::User},
    models::{AssignUserReq, LoginReqDto, RegisterReq, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and records the refresh token's jti.
async fn issue_token_pair(
    pool: &MySqlPool,
    config: &Config,
    subject: &TokenSubject,
) -> AppResult<TokenPair> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// User registration. New accounts always start with the Employee role.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Empty username or password"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let username = user.username.trim().to_lowercase();

    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::bad_request(
            "Username and password must not be empty",
        ));
    }

    let hashed = hash_password(&user.password)?;

    let result = sqlx::query(r#"INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)"#)
        .bind(&username)
        .bind(hashed)
        .bind(Role::Employee.id())
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!(username = %username, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) if AppError::is_duplicate_key(&e) => {
            Err(AppError::Conflict("Username already taken".into()))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::bad_request("Username or password required"));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(db_user) = db_user else {
        info!("Invalid credentials: user not found");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&user.password, &db_user.password) {
        info!("Invalid credentials: password mismatch");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username,
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };
    let tokens = issue_token_pair(pool.get_ref(), &config, &subject).await?;

    // last_login_at is informational
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates a refresh token: the presented one is revoked, a new pair is issued.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| AppError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Refresh token required"));
    }

    // revoke-and-check in one statement so a token can only be used once
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        return Err(AppError::unauthorized("Refresh token revoked or unknown"));
    }

    let tokens = issue_token_pair(pool.get_ref(), &config, &TokenSubject::from(&claims)).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes a refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, jti = %claims.jti, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

/// The authenticated caller.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "userId": auth.user_id,
        "username": auth.username,
        "roleId": auth.role.id(),
        "employeeId": auth.employee_id,
    }))
}

/// Sets a user's role and linked employee profile (Admin only).
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    request_body = AssignUserReq,
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn assign_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<AssignUserReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    let role = Role::from_id(body.role_id)
        .ok_or_else(|| AppError::bad_request("Unknown role id"))?;

    let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool.get_ref())
        .await?;

    if found == 0 {
        return Err(AppError::not_found("User not found"));
    }

    sqlx::query("UPDATE users SET role_id = ?, employee_id = ? WHERE id = ?")
        .bind(role.id())
        .bind(body.employee_id)
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id, role = ?role, by = auth.user_id, "User role updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "User updated successfully"
    })))
}

use actix_web::{get, post, web, Responder};
use tracing::info;

use crate::auth::{create_access_token, generate_otp, hash_password, OTP_TTL};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::NewUser;
use crate::types::{
    ChangePasswordRequest, Envelope, ResetPasswordRequest, SendOtpRequest, SignUpRequest,
    TokenResponse, UserInfoResponse, VerifyOtpRequest,
};
use crate::AppState;

fn validate_mobile(mobile: &str) -> ApiResult<()> {
    if mobile.len() != 10 || !mobile.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation("mobile must be 10 digits".to_string()));
    }
    Ok(())
}

#[post("/auth/signup")]
pub async fn sign_up(
    app_state: web::Data<AppState>,
    web::Json(request): web::Json<SignUpRequest>,
) -> ApiResult<impl Responder> {
    validate_mobile(&request.mobile)?;
    if let Some(password) = &request.password {
        if password.len() < 6 {
            return Err(ApiError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }
    }

    if let Some(email) = &request.email {
        if app_state.store.get_user_by_email(email).await?.is_some() {
            return Err(ApiError::Validation("Email Already Present".to_string()));
        }
    }
    if app_state
        .store
        .get_user_by_mobile(&request.mobile)
        .await?
        .is_some()
    {
        return Err(ApiError::Validation(
            "Phone Number Already Present".to_string(),
        ));
    }

    let password_hash = match &request.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let user = app_state
        .store
        .create_user(NewUser {
            mobile: request.mobile,
            name: request.name,
            email: request.email,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, "user signed up");

    Ok(web::Json(Envelope::success("Successfully Added")))
}

/// Issues a short-lived one-time code. The response body carries the code
/// directly, standing in for an SMS gateway.
#[post("/auth/send-otp")]
pub async fn send_otp(
    app_state: web::Data<AppState>,
    request: web::Json<SendOtpRequest>,
) -> ApiResult<impl Responder> {
    send_otp_inner(&app_state, &request.mobile).await
}

/// Same flow as send-otp; the reset path just verifies the code afterwards.
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    app_state: web::Data<AppState>,
    request: web::Json<SendOtpRequest>,
) -> ApiResult<impl Responder> {
    send_otp_inner(&app_state, &request.mobile).await
}

async fn send_otp_inner(app_state: &AppState, mobile: &str) -> ApiResult<web::Json<Envelope<serde_json::Value>>> {
    let user = app_state
        .store
        .get_user_by_mobile(mobile)
        .await?
        .ok_or_else(|| ApiError::not_found("Phone Number"))?;

    let otp = generate_otp();
    app_state
        .cache
        .set(&format!("otp:{}", otp), user.id.to_string(), OTP_TTL)
        .await;

    Ok(web::Json(Envelope::fetched(serde_json::json!({
        "OTP": format!("{} (Valid for 120 seconds)", otp)
    }))))
}

/// Looks up the code and deletes it on success so it cannot be replayed.
async fn consume_otp(app_state: &AppState, otp: &str) -> ApiResult<i64> {
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation("OTP must be 6 digits".to_string()));
    }

    let key = format!("otp:{}", otp);
    let user_id = app_state
        .cache
        .get(&key)
        .await
        .ok_or_else(|| ApiError::Validation("OTP not valid".to_string()))?;
    app_state.cache.delete(&key).await;

    user_id
        .parse::<i64>()
        .map_err(|_| ApiError::Validation("OTP not valid".to_string()))
}

#[post("/auth/verify-otp")]
pub async fn verify_otp(
    app_state: web::Data<AppState>,
    web::Json(request): web::Json<VerifyOtpRequest>,
) -> ApiResult<impl Responder> {
    let user_id = consume_otp(&app_state, &request.otp).await?;

    let access_token = create_access_token(user_id, &app_state.config.jwt_secret)
        .map_err(ApiError::Internal)?;

    Ok(web::Json(Envelope::fetched(TokenResponse { access_token })))
}

#[post("/auth/reset-password")]
pub async fn reset_password(
    app_state: web::Data<AppState>,
    web::Json(request): web::Json<ResetPasswordRequest>,
) -> ApiResult<impl Responder> {
    let user_id = consume_otp(&app_state, &request.otp).await?;

    let user = app_state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let password_hash = hash_password(&request.password)?;
    app_state
        .store
        .update_password(user.id, &password_hash)
        .await?;

    Ok(web::Json(Envelope::success("SuccessFully Updated Password")))
}

#[post("/auth/change-password")]
pub async fn change_password(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
    web::Json(request): web::Json<ChangePasswordRequest>,
) -> ApiResult<impl Responder> {
    let user = app_state
        .store
        .get_user(authenticated_user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let password_hash = hash_password(&request.new_password)?;
    app_state
        .store
        .update_password(user.id, &password_hash)
        .await?;

    Ok(web::Json(Envelope::success("SuccessFully Updated Password")))
}

#[get("/me")]
pub async fn user_info(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
) -> ApiResult<impl Responder> {
    let user = app_state
        .store
        .get_user(authenticated_user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(web::Json(Envelope::fetched(UserInfoResponse {
        name: user.name,
        email: user.email,
        mobile_number: user.mobile,
    })))
}

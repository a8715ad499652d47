use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    EventObject, EventType, Webhook,
};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::SubscriptionTier;
use crate::types::{CheckoutResponse, Envelope, SubscriptionStatusResponse};
use crate::AppState;

#[post("/subscribe/pro")]
pub async fn subscribe_pro(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
) -> ApiResult<impl Responder> {
    let line_item = CreateCheckoutSessionLineItems {
        price: Some(app_state.config.stripe_pro_price_id.clone()),
        quantity: Some(1),
        ..Default::default()
    };

    // The user id rides along in metadata so the webhook can find the row
    // to upgrade.
    let metadata = std::collections::HashMap::from([(
        "user_id".to_string(),
        authenticated_user.user_id.to_string(),
    )]);

    let params = CreateCheckoutSession {
        line_items: Some(vec![line_item]),
        mode: Some(CheckoutSessionMode::Subscription),
        success_url: Some("http://localhost:3000/stripe-success?session_id={CHECKOUT_SESSION_ID}"),
        cancel_url: Some("http://localhost:3000/stripe-cancel"),
        metadata: Some(metadata),
        ..Default::default()
    };

    let session = CheckoutSession::create(&app_state.stripe_client, params)
        .await
        .map_err(|e| {
            error!("failed to create checkout session: {:?}", e);
            ApiError::Internal(anyhow::anyhow!("checkout session creation failed"))
        })?;

    let checkout_url = session
        .url
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("checkout session has no url")))?;

    Ok(web::Json(Envelope::fetched(CheckoutResponse {
        checkout_url,
    })))
}

/// Signature-verified payment events. `checkout.session.completed` flips the
/// metadata-named user to pro; `invoice.payment_failed` is acknowledged and
/// the downgrade itself is left to a future pass.
#[post("/webhook/stripe")]
pub async fn stripe_webhook(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| actix_web::error::ErrorBadRequest("Missing signature"))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid payload"))?;

    let event = Webhook::construct_event(
        payload,
        signature,
        &app_state.config.stripe_webhook_secret,
    )
    .map_err(|e| {
        warn!("webhook signature rejected: {:?}", e);
        actix_web::error::ErrorBadRequest("Invalid signature")
    })?;

    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            let EventObject::CheckoutSession(session) = event.data.object else {
                return Err(actix_web::error::ErrorBadRequest("Invalid payload"));
            };

            let user_id = session
                .metadata
                .as_ref()
                .and_then(|m| m.get("user_id"))
                .and_then(|id| id.parse::<i64>().ok());

            let Some(user_id) = user_id else {
                warn!("checkout completed without a usable user_id in metadata");
                return Ok(HttpResponse::BadRequest().json(json!({"status": "user not found"})));
            };

            if app_state
                .store
                .get_user(user_id)
                .await
                .map_err(actix_web::error::ErrorInternalServerError)?
                .is_none()
            {
                return Ok(HttpResponse::BadRequest().json(json!({"status": "user not found"})));
            }

            app_state
                .store
                .set_subscription_tier(user_id, SubscriptionTier::Pro)
                .await
                .map_err(actix_web::error::ErrorInternalServerError)?;

            info!(user_id, "user upgraded to pro");
            Ok(HttpResponse::Ok().json(json!({"status": "user upgraded to pro"})))
        }
        EventType::InvoicePaymentFailed => {
            warn!("invoice payment failed; downgrade not yet enforced");
            Ok(HttpResponse::Ok().json(json!({"status": "user marked for downgrade"})))
        }
        other => Ok(HttpResponse::Ok().json(json!({"status": format!("event {} handled", other)}))),
    }
}

#[get("/status")]
pub async fn subscription_status(
    app_state: web::Data<AppState>,
    authenticated_user: AuthenticatedUser,
) -> ApiResult<impl Responder> {
    let user = app_state
        .store
        .get_user(authenticated_user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let tier = match user.subscription_tier {
        SubscriptionTier::Pro => "Pro",
        SubscriptionTier::Basic => "Basic",
    };

    Ok(web::Json(Envelope::fetched(SubscriptionStatusResponse {
        tier: tier.to_string(),
    })))
}

use anyhow::anyhow;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_pro_price_id: String,
    pub provider_api_key: String,
    pub provider_api_base: String,
    pub provider_model: String,
    pub bind_addr: String,
    pub worker_count: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL not found"))?;

        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow!("JWT_SECRET not found"))?;

        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| anyhow!("STRIPE_SECRET_KEY not found"))?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| anyhow!("STRIPE_WEBHOOK_SECRET not found"))?;

        let stripe_pro_price_id = std::env::var("STRIPE_PRO_PRICE_ID")
            .map_err(|_| anyhow!("STRIPE_PRO_PRICE_ID not found"))?;

        let provider_api_key =
            std::env::var("PROVIDER_API_KEY").map_err(|_| anyhow!("PROVIDER_API_KEY not found"))?;

        let provider_api_base = std::env::var("PROVIDER_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let provider_model =
            std::env::var("PROVIDER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let worker_count = std::env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        Ok(AppConfig {
            database_url,
            jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_pro_price_id,
            provider_api_key,
            provider_api_base,
            provider_model,
            bind_addr,
            worker_count,
        })
    }
}

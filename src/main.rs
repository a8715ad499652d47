use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley::cache::KvCache;
use parley::config::AppConfig;
use parley::middleware::auth::Authentication;
use parley::pipeline::PromptPipeline;
use parley::provider::OpenAiProvider;
use parley::queue::TaskQueue;
use parley::quota::{QuotaLedger, DAILY_PROMPT_LIMIT};
use parley::routes;
use parley::store::{ConversationStore, PgStore};
use parley::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn ConversationStore> = Arc::new(PgStore::new(pool));
    let cache = KvCache::new(10_000);
    let provider = Arc::new(OpenAiProvider::new(&config));

    // Workers get their own store handle; the request path never lends its
    // session into worker execution.
    let queue = TaskQueue::start(config.worker_count, provider, store.clone());

    let ledger = QuotaLedger::new(store.clone(), DAILY_PROMPT_LIMIT);
    let pipeline = PromptPipeline::new(store.clone(), cache.clone(), queue, ledger);

    let stripe_client = stripe::Client::new(config.stripe_secret_key.clone());

    let app_state = web::Data::new(AppState {
        config: config.clone(),
        store,
        cache,
        pipeline,
        stripe_client,
    });

    let bind_addr = config.bind_addr.clone();
    info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .wrap(Authentication {
                app_config: config.clone(),
            })
            .service(
                web::scope("/api/v1/user")
                    .service(routes::auth::sign_up)
                    .service(routes::auth::send_otp)
                    .service(routes::auth::forgot_password)
                    .service(routes::auth::verify_otp)
                    .service(routes::auth::reset_password)
                    .service(routes::auth::change_password)
                    .service(routes::auth::user_info),
            )
            .service(
                web::scope("/api/v1/chatroom")
                    .service(routes::chatroom::task_status)
                    .service(routes::chatroom::create_chatroom)
                    .service(routes::chatroom::list_chatrooms)
                    .service(routes::chatroom::get_history)
                    .service(routes::chatroom::submit_prompt),
            )
            .service(
                web::scope("/api/v1/subscription")
                    .service(routes::subscription::subscribe_pro)
                    .service(routes::subscription::stripe_webhook)
                    .service(routes::subscription::subscription_status),
            )
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}

use actix_web::{web, App, HttpServer};
use direct_message_service::{
    config, db, error, logging, routes,
    services::{MessageStore, PgMessageStore},
    state::AppState,
    websocket::{ChatHub, PresenceRegistry},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)?;
    db::run_migrations(&db).await?;

    // Validation only; token issuance stays with the identity collaborator.
    actix_middleware::jwt::init_validation(&cfg.jwt_public_key).map_err(|e| {
        error::AppError::StartServer(format!("Failed to initialize JWT validation: {e}"))
    })?;

    let store: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(db.clone()));
    let registry = PresenceRegistry::new();
    let hub = Arc::new(ChatHub::new(registry.clone(), store.clone()));

    let state = AppState {
        registry,
        hub,
        store,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting direct-message-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::RequestId::new())
            .wrap(actix_middleware::Logging)
            .app_data(web::Data::new(state.clone()))
            .service(
                // REST surface; the WebSocket route below authenticates on
                // its own because browsers cannot set upgrade headers.
                web::scope("/api")
                    .wrap(actix_middleware::JwtAuthMiddleware)
                    .service(routes::messages::send_message)
                    .service(routes::messages::get_conversation)
                    .service(routes::messages::mark_message_read)
                    .service(routes::messages::get_unread_count)
                    .service(routes::messages::get_conversations),
            )
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind REST: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("REST server: {e}")))
}

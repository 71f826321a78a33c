use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_api::{AppState, AppStateInner, messages, replies, slack_events, verify};
use courier_gateway::GatewayState;
use courier_gateway::connection;
use courier_gateway::forward::Forwarder;
use courier_gateway::presence::Presence;
use courier_slack::client::SlackClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    // Config — the Slack credentials have no sane default; fail fast.
    let signing_secret = require_env("SLACK_SIGNING_SECRET")?;
    let bot_token = require_env("SLACK_BOT_TOKEN")?;
    let channel = require_env("SLACK_CHANNEL")?;
    let forward_url = require_env("FORWARD_WEBHOOK_URL")?;
    let db_path = std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into());
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COURIER_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;

    // Init database
    let db = Arc::new(courier_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let presence = Presence::new();
    let slack = SlackClient::new(bot_token, channel);
    let forwarder = Forwarder::new(forward_url);

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        presence: presence.clone(),
        slack,
        signing_secret,
    });

    let gateway_state = GatewayState {
        presence,
        db,
        forwarder,
    };

    // Routes
    let http_routes = Router::new()
        .route("/webhook/reply", post(replies::webhook_reply))
        .route("/messages", get(messages::get_messages))
        .route("/verify", post(verify::verify_member))
        .route("/slack/events", post(slack_events::slack_events))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway_state);

    let app = Router::new()
        .merge(http_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

async fn ws_upgrade(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state))
}

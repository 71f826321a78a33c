pub mod deliver;
pub mod messages;
pub mod replies;
pub mod slack_events;
pub mod verify;

use std::sync::Arc;

use courier_db::Database;
use courier_gateway::presence::Presence;
use courier_slack::client::SlackClient;

/// Shared state for all HTTP handlers.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub presence: Presence,
    pub slack: SlackClient,
    pub signing_secret: String,
}

pub type AppState = Arc<AppStateInner>;

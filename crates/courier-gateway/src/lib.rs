pub mod connection;
pub mod forward;
pub mod presence;

use std::sync::Arc;

use courier_db::Database;
use forward::Forwarder;
use presence::Presence;

/// Shared handles every gateway connection works against.
#[derive(Clone)]
pub struct GatewayState {
    pub presence: Presence,
    pub db: Arc<Database>,
    pub forwarder: Forwarder,
}

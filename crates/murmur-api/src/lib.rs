pub mod error;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod profile;

use std::sync::Arc;

use murmur_db::Database;
use murmur_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
}

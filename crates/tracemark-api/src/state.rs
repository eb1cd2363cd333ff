use std::sync::Arc;

use tracemark_engine::{Dispatcher, Engine};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

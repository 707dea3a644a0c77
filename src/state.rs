use std::sync::Arc;

use crate::access::AccessControl;
use crate::database::Store;
use crate::notify::Notifier;

/// Shared, immutable per-process services handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub access: Arc<dyn AccessControl>,
    pub notifier: Arc<dyn Notifier>,
}

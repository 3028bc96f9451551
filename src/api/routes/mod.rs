pub mod folders;
pub mod meetings;
pub mod recording;
pub mod workspaces;

use std::sync::Arc;

use crate::store::MeetingStore;

/// Shared store handle for the CRUD routes.
#[derive(Clone)]
pub struct StoreState {
    pub store: Arc<dyn MeetingStore>,
}

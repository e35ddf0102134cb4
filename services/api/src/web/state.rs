//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use wachat_core::ports::{DataStore, MessageSender};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub sender: Arc<dyn MessageSender>,
    pub config: Arc<Config>,
}

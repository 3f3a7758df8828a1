use crate::api::SupabaseClient;
use crate::models::Session;
use leptos::prelude::*;

pub(crate) mod bookmark_feed;

#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub supabase: RwSignal<SupabaseClient>,

    /// Single source of truth for authentication state. Written only on
    /// login completion, sign-out, and expiry detection; everything else
    /// reads it (the session gate reacts to it going `None`).
    pub session: RwSignal<Option<Session>>,
}

impl AppState {
    pub fn new() -> Self {
        let client = SupabaseClient::load_from_storage();
        let session = client.current_session();

        Self {
            supabase: RwSignal::new(client),
            session: RwSignal::new(session),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AppContext(pub AppState);

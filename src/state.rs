use std::sync::Arc;

use crate::auth::{AccessGate, AuthComponents, AuthorizationResolver, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub gate: AccessGate,
    pub resolver: AuthorizationResolver,
}

impl AppState {
    pub fn new(auth: AuthComponents) -> Arc<Self> {
        Arc::new(Self {
            sessions: auth.sessions,
            gate: auth.gate,
            resolver: auth.resolver,
        })
    }
}

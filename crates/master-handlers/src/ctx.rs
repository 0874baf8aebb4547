//! Composition context threaded through every handler call: the process-wide
//! singletons a handler needs, injected rather than looked up globally
//! (spec.md §9 "global singletons injected via a Server/HandlerCtx").

use std::sync::Arc;

use master_model::ChannelDirectory;
use master_registry::SessionRegistry;
use master_userservice::{Probe, UserService};

pub struct HandlerCtx {
    pub registry: Arc<SessionRegistry>,
    pub directory: Arc<ChannelDirectory>,
    pub userservice: Arc<dyn UserService>,
    pub probe: Arc<Probe>,
}

impl HandlerCtx {
    pub fn new(
        registry: Arc<SessionRegistry>,
        directory: Arc<ChannelDirectory>,
        userservice: Arc<dyn UserService>,
        probe: Arc<Probe>,
    ) -> Self {
        Self {
            registry,
            directory,
            userservice,
            probe,
        }
    }
}

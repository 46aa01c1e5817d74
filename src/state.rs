use crate::config::TransitConfig;
use crate::services::schedule_store::{Authenticator, ScheduleStore};
use crate::services::schedules::ScheduleService;
use crate::services::transit::TransitService;
use crate::services::transit_api::TransitApi;
use std::sync::Arc;

/// Shared, immutable per-process state handed to every handler.
pub struct AppState {
    pub transit: TransitService,
    pub schedules: ScheduleService,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(
        transit_api: Arc<dyn TransitApi>,
        store: Arc<dyn ScheduleStore>,
        auth: Arc<dyn Authenticator>,
        config: &TransitConfig,
    ) -> Self {
        Self {
            transit: TransitService::new(transit_api, config),
            schedules: ScheduleService::new(store),
            auth,
        }
    }
}

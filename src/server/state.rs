use crate::pipeline::EnrichmentPipeline;
use std::sync::Mutex;

/// Shared by every request. Provider searches are blocking and rate-limited,
/// so requests take turns on the one pipeline.
pub struct AppState {
    pub pipeline: Mutex<EnrichmentPipeline>,
}

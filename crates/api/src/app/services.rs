use std::sync::Arc;

use serde_json::Value as JsonValue;

use grouppool_events::{EventEnvelope, InMemoryEventBus};
use grouppool_infra::event_store::InMemoryEventStore;
use grouppool_infra::{Clock, InMemoryTransfer, LedgerService};

use crate::config::ApiConfig;

pub type PoolService = LedgerService<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
    Arc<dyn Clock>,
    Arc<InMemoryTransfer>,
>;

/// Everything the handlers need, shared behind one `Arc`.
#[derive(Debug)]
pub struct AppServices {
    pub ledgers: PoolService,
    pub default_duration_secs: u64,
}

pub fn build_services(
    config: &ApiConfig,
    clock: Arc<dyn Clock>,
    transfer: Arc<InMemoryTransfer>,
) -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    AppServices {
        ledgers: LedgerService::new(store, bus, clock, transfer),
        default_duration_secs: config.default_duration_secs,
    }
}

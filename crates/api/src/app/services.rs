use std::sync::Arc;

use tally_core::SystemClock;
use tally_infra::{BillRegistry, BillingConfig, InMemoryJournal};

pub type Journal = Arc<InMemoryJournal>;

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct AppServices {
    pub bills: BillRegistry<Journal>,
}

pub fn build_services(config: &BillingConfig) -> AppServices {
    let journal: Journal = Arc::new(InMemoryJournal::new());
    let bills = BillRegistry::new(journal, Arc::new(SystemClock), config.clone());
    AppServices { bills }
}

//! Bill registry: the operations the transport layer calls.
//!
//! The registry maps bill ids to running actors and guarantees there is
//! exactly one actor (one writer) per id. It validates input at the boundary
//! before anything is enqueued, routes commands by their target id and
//! serves snapshots straight from each actor's published state.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{info, warn};

use tally_bills::{Bill, BillEvent, BillId, Currency, validate_amount};
use tally_core::SharedClock;
use tally_events::{Command, EventEnvelope};

use crate::actor::{BillActor, BillHandle, BillRequest};
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::journal::EventJournal;

/// Which bills `list_bills` returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BillStatusFilter {
    #[default]
    All,
    Open,
    Closed,
}

impl BillStatusFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        match self {
            BillStatusFilter::All => true,
            BillStatusFilter::Open => !bill.is_closed(),
            BillStatusFilter::Closed => bill.is_closed(),
        }
    }
}

impl core::str::FromStr for BillStatusFilter {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(BillStatusFilter::All),
            "open" => Ok(BillStatusFilter::Open),
            "closed" => Ok(BillStatusFilter::Closed),
            _ => Err(BillingError::Validation("invalid status parameter".to_string())),
        }
    }
}

/// Registry of running bill actors.
#[derive(Debug)]
pub struct BillRegistry<J> {
    bills: RwLock<HashMap<BillId, BillHandle>>,
    journal: J,
    clock: SharedClock,
    config: BillingConfig,
}

impl<J> BillRegistry<J>
where
    J: EventJournal + Clone + 'static,
{
    pub fn new(journal: J, clock: SharedClock, config: BillingConfig) -> Self {
        Self {
            bills: RwLock::new(HashMap::new()),
            journal,
            clock,
            config,
        }
    }

    /// Open a new bill and start its actor.
    ///
    /// The currency is checked before any instance is created. Must be called
    /// from within a tokio runtime.
    pub fn create_bill(&self, currency: &str) -> Result<BillId, BillingError> {
        let currency: Currency = currency.parse().inspect_err(|_| {
            warn!(currency, "rejected bill with unsupported currency");
        })?;

        let id = BillId::generate();
        let (handle, _join) = BillActor::spawn(
            id,
            currency,
            self.journal.clone(),
            self.clock.clone(),
            self.config.mailbox_capacity,
        )?;

        self.bills
            .write()
            .map_err(|_| BillingError::Unavailable("bill registry lock poisoned".to_string()))?
            .insert(handle.id(), handle);

        info!(bill_id = %id, %currency, "bill created");
        Ok(id)
    }

    /// Add a line item and return the bill as it stands after the charge.
    pub async fn add_line_item(
        &self,
        id: BillId,
        description: impl Into<String>,
        amount: f64,
    ) -> Result<Bill, BillingError> {
        validate_amount(amount)?;
        self.dispatch(BillRequest::AddLineItem {
            bill_id: id,
            description: description.into(),
            amount,
        })
        .await
    }

    /// Close a bill and return its final state.
    pub async fn close_bill(&self, id: BillId) -> Result<Bill, BillingError> {
        self.dispatch(BillRequest::Close { bill_id: id }).await
    }

    /// Route a request to the actor that owns its target bill.
    pub async fn dispatch(&self, request: BillRequest) -> Result<Bill, BillingError> {
        let id = BillId::new(request.target_aggregate_id());
        let handle = self.handle(id)?;
        handle.send(request).await
    }

    /// Current state of one bill. Never waits on command processing.
    pub fn snapshot(&self, id: BillId) -> Result<Bill, BillingError> {
        Ok(self.handle(id)?.snapshot())
    }

    /// Snapshots of every known bill matching `filter`, oldest first.
    pub fn list_bills(&self, filter: BillStatusFilter) -> Result<Vec<Bill>, BillingError> {
        let handles: Vec<BillHandle> = self
            .bills
            .read()
            .map_err(|_| BillingError::Unavailable("bill registry lock poisoned".to_string()))?
            .values()
            .cloned()
            .collect();

        let mut bills: Vec<Bill> = handles
            .iter()
            .map(BillHandle::snapshot)
            .filter(|bill| filter.matches(bill))
            .collect();
        bills.sort_by_key(|b| (b.created_at(), b.id_typed()));
        Ok(bills)
    }

    /// The checkpointed event history of one bill, in sequence order.
    pub fn history(&self, id: BillId) -> Result<Vec<EventEnvelope<BillEvent>>, BillingError> {
        self.handle(id)?;
        self.journal
            .load_stream(id.aggregate_id())?
            .iter()
            .map(|stored| stored.decode::<BillEvent>().map_err(BillingError::from))
            .collect()
    }

    fn handle(&self, id: BillId) -> Result<BillHandle, BillingError> {
        self.bills
            .read()
            .map_err(|_| BillingError::Unavailable("bill registry lock poisoned".to_string()))?
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::not_found(id))
    }
}

//! Per-bill actor loop.
//!
//! One task owns one [`Bill`] and is its only writer. Commands arrive through
//! a single ordered inbox and are processed one at a time:
//!
//! ```text
//! BillRequest
//!   ↓ validate (no clock read for rejected input)
//!   ↓ stamp with the injected clock
//!   ↓ decide events (Aggregate::handle)
//!   ↓ checkpoint to the journal
//!   ↓ apply events
//!   ↓ publish snapshot (watch channel)
//!   ↓ acknowledge to the caller
//! ```
//!
//! Readers take snapshots from the watch channel and never wait on the inbox.
//! Because the acknowledgement is sent after the snapshot is published, a
//! snapshot taken after an acknowledged command always reflects it.
//!
//! Once a close is applied the inbox is closed and drained: every command
//! queued behind the close is rejected, then the task ends.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tally_bills::{
    AddLineItem, Bill, BillCommand, BillEvent, BillId, CloseBill, CreateBill, Currency,
    validate_amount,
};
use tally_core::{AggregateId, AggregateRoot, Clock, EventId, ExpectedVersion, SharedClock};
use tally_events::{Command, execute_committed};

use crate::error::BillingError;
use crate::journal::{EventJournal, UncommittedEvent};

pub const BILL_AGGREGATE_TYPE: &str = "billing.bill";

/// A command addressed to a running bill, before it is stamped with a time.
#[derive(Debug, Clone, PartialEq)]
pub enum BillRequest {
    AddLineItem {
        bill_id: BillId,
        description: String,
        amount: f64,
    },
    Close {
        bill_id: BillId,
    },
}

impl BillRequest {
    pub fn bill_id(&self) -> BillId {
        match self {
            BillRequest::AddLineItem { bill_id, .. } | BillRequest::Close { bill_id } => *bill_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            BillRequest::AddLineItem { .. } => "add_line_item",
            BillRequest::Close { .. } => "close",
        }
    }
}

impl Command for BillRequest {
    fn target_aggregate_id(&self) -> AggregateId {
        self.bill_id().aggregate_id()
    }
}

type Reply = oneshot::Sender<Result<Bill, BillingError>>;

#[derive(Debug)]
struct Mail {
    request: BillRequest,
    reply: Reply,
}

/// Cloneable handle to a running bill actor.
#[derive(Debug, Clone)]
pub struct BillHandle {
    id: BillId,
    inbox: mpsc::Sender<Mail>,
    snapshot: watch::Receiver<Bill>,
}

impl BillHandle {
    pub fn id(&self) -> BillId {
        self.id
    }

    /// Latest fully applied state. Never blocks.
    pub fn snapshot(&self) -> Bill {
        self.snapshot.borrow().clone()
    }

    /// Enqueue a request and wait for the actor's verdict.
    ///
    /// Waits for inbox capacity when the inbox is full. If the actor has
    /// already terminated because the bill was closed, the request is rejected
    /// the same way the actor would have rejected it.
    pub async fn send(&self, request: BillRequest) -> Result<Bill, BillingError> {
        let (reply, response) = oneshot::channel();
        let kind = request.kind();

        if let Err(mpsc::error::SendError(mail)) = self.inbox.send(Mail { request, reply }).await {
            return Err(self.rejected_after_exit(&mail.request));
        }

        match response.await {
            Ok(result) => result,
            Err(_) => {
                error!(bill_id = %self.id, command = kind, "bill actor dropped reply");
                Err(BillingError::Unavailable(
                    "bill actor stopped before replying".to_string(),
                ))
            }
        }
    }

    fn rejected_after_exit(&self, request: &BillRequest) -> BillingError {
        if !self.snapshot.borrow().is_closed() {
            return BillingError::Unavailable(format!("bill actor {} is not running", self.id));
        }
        closed_rejection(request)
    }
}

/// How a request is rejected once its bill is closed.
fn closed_rejection(request: &BillRequest) -> BillingError {
    match request {
        BillRequest::AddLineItem { .. } => BillingError::Validation("bill is closed".to_string()),
        BillRequest::Close { .. } => BillingError::Validation("bill is already closed".to_string()),
    }
}

/// The command-processing loop for a single bill.
pub struct BillActor<J> {
    bill: Bill,
    journal: J,
    clock: SharedClock,
    inbox: mpsc::Receiver<Mail>,
    snapshot: watch::Sender<Bill>,
}

impl<J> BillActor<J>
where
    J: EventJournal + 'static,
{
    /// Create a bill, checkpoint its creation and start its actor task.
    ///
    /// Creation happens before the task is spawned so a failure is reported to
    /// the caller and no task is left behind.
    pub fn spawn(
        id: BillId,
        currency: Currency,
        journal: J,
        clock: SharedClock,
        mailbox_capacity: usize,
    ) -> Result<(BillHandle, JoinHandle<()>), BillingError> {
        let mut bill = Bill::empty(id);
        let create = BillCommand::CreateBill(CreateBill {
            bill_id: id,
            currency,
            created_at: clock.now(),
        });
        execute_committed(&mut bill, &create, |events, version| {
            checkpoint(&journal, id, events, version)
        })?;

        let (inbox_tx, inbox_rx) = mpsc::channel(mailbox_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(bill.clone());

        let actor = BillActor {
            bill,
            journal,
            clock,
            inbox: inbox_rx,
            snapshot: snapshot_tx,
        };
        let join = tokio::spawn(actor.run());

        let handle = BillHandle {
            id,
            inbox: inbox_tx,
            snapshot: snapshot_rx,
        };
        Ok((handle, join))
    }

    async fn run(mut self) {
        let id = self.bill.id_typed();
        info!(bill_id = %id, currency = %self.bill.currency(), "bill actor started");

        while let Some(mail) = self.inbox.recv().await {
            let result = self.process(mail.request);
            let _ = mail.reply.send(result);

            if self.bill.is_closed() {
                break;
            }
        }

        if !self.bill.is_closed() {
            warn!(bill_id = %id, "bill inbox dropped while open; actor stopping");
            return;
        }

        self.inbox.close();
        let mut rejected = 0usize;
        while let Some(mail) = self.inbox.recv().await {
            let result = self.process(mail.request);
            let _ = mail.reply.send(result);
            rejected += 1;
        }

        info!(
            bill_id = %id,
            items = self.bill.line_items().len(),
            total = self.bill.total_amount(),
            rejected_after_close = rejected,
            "bill actor finished"
        );
    }

    fn process(&mut self, request: BillRequest) -> Result<Bill, BillingError> {
        let id = self.bill.id_typed();
        if request.bill_id() != id {
            return Err(BillingError::Validation(format!(
                "request for bill {} delivered to bill {id}",
                request.bill_id()
            )));
        }

        let kind = request.kind();
        if self.bill.is_closed() {
            let err = closed_rejection(&request);
            warn!(bill_id = %id, command = kind, error = %err, "command rejected");
            return Err(err);
        }

        let command = match request {
            BillRequest::AddLineItem {
                bill_id,
                description,
                amount,
            } => {
                validate_amount(amount).inspect_err(|e| {
                    warn!(bill_id = %id, amount, error = %e, "line item rejected");
                })?;
                BillCommand::AddLineItem(AddLineItem {
                    bill_id,
                    description,
                    amount,
                    occurred_at: self.clock.now(),
                })
            }
            BillRequest::Close { bill_id } => BillCommand::CloseBill(CloseBill {
                bill_id,
                occurred_at: self.clock.now(),
            }),
        };

        let journal = &self.journal;
        let outcome = execute_committed(&mut self.bill, &command, |events, version| {
            checkpoint(journal, id, events, version)
        });

        match outcome {
            Ok(events) => {
                self.snapshot.send_replace(self.bill.clone());
                for event in &events {
                    log_applied(id, event, &self.bill);
                }
                Ok(self.bill.clone())
            }
            Err(e) => {
                if e.is_retryable() {
                    error!(bill_id = %id, command = kind, error = %e, "checkpoint failed");
                } else {
                    warn!(bill_id = %id, command = kind, error = %e, "command rejected");
                }
                Err(e)
            }
        }
    }
}

fn checkpoint<J: EventJournal>(
    journal: &J,
    id: BillId,
    events: &[BillEvent],
    version: u64,
) -> Result<(), BillingError> {
    let uncommitted = events
        .iter()
        .map(|ev| UncommittedEvent::from_typed(id.aggregate_id(), BILL_AGGREGATE_TYPE, EventId::new(), ev))
        .collect::<Result<Vec<_>, _>>()?;
    journal.append(uncommitted, ExpectedVersion::Exact(version))?;
    Ok(())
}

fn log_applied(id: BillId, event: &BillEvent, bill: &Bill) {
    match event {
        BillEvent::BillCreated(_) => {}
        BillEvent::LineItemAdded(e) => debug!(
            bill_id = %id,
            description = %e.description,
            amount = e.amount,
            total = bill.total_amount(),
            version = bill.version(),
            "line item added"
        ),
        BillEvent::BillClosed(e) => info!(
            bill_id = %id,
            closed_on = %e.closed_on,
            total = bill.total_amount(),
            "bill closed"
        ),
    }
}

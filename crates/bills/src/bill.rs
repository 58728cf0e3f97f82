use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult};
use tally_events::{Command, Event};

use crate::money::{Currency, MAX_CENTS, cents_to_amount, round2_cents};

/// Bill identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillId(pub AggregateId);

impl BillId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.0
    }
}

impl core::fmt::Display for BillId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for BillId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Bill lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Open,
    Closed,
}

/// A single charge on a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    /// Amount as submitted; the bill total accumulates it rounded to cents.
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Bill.
#[derive(Debug, Clone, PartialEq)]
pub struct Bill {
    id: BillId,
    currency: Currency,
    line_items: Vec<LineItem>,
    /// Sum of `round2_cents(item.amount)` over `line_items`.
    total_cents: i64,
    created_at: DateTime<Utc>,
    closed_on: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Bill {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BillId) -> Self {
        Self {
            id,
            currency: Currency::Usd,
            line_items: Vec::new(),
            total_cents: 0,
            created_at: DateTime::<Utc>::default(),
            closed_on: None,
            version: 0,
            created: false,
        }
    }

    /// Open a new bill directly (no command round-trip).
    pub fn open(id: BillId, currency: Currency, created_at: DateTime<Utc>) -> Self {
        let mut bill = Self::empty(id);
        bill.apply(&BillEvent::BillCreated(BillCreated {
            bill_id: id,
            currency,
            created_at,
        }));
        bill
    }

    /// Rebuild a bill by applying its event history in order.
    pub fn replay<'a>(id: BillId, history: impl IntoIterator<Item = &'a BillEvent>) -> Self {
        let mut bill = Self::empty(id);
        for event in history {
            bill.apply(event);
        }
        bill
    }

    pub fn id_typed(&self) -> BillId {
        self.id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    pub fn total_amount(&self) -> f64 {
        cents_to_amount(self.total_cents)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_on(&self) -> Option<DateTime<Utc>> {
        self.closed_on
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_closed(&self) -> bool {
        self.closed_on.is_some()
    }

    pub fn status(&self) -> BillStatus {
        if self.is_closed() {
            BillStatus::Closed
        } else {
            BillStatus::Open
        }
    }

    /// Total recomputed from the line items; always equals `total_cents()`.
    pub fn recomputed_total_cents(&self) -> i64 {
        self.line_items.iter().map(|i| round2_cents(i.amount)).sum()
    }

    /// Append a line item to an open bill.
    ///
    /// Fails with `Validation` for an invalid amount or a total that would
    /// overflow, and `Conflict` once the bill is closed. On failure nothing
    /// changes.
    pub fn apply_line_item(&mut self, item: LineItem) -> DomainResult<()> {
        self.ensure_created()?;
        validate_amount(item.amount)?;
        self.ensure_open()?;
        self.total_cents = self.total_after(item.amount)?;
        self.line_items.push(item);
        Ok(())
    }

    /// Close the bill at `at`.
    ///
    /// Closing twice is a `Conflict`: a duplicate close usually means a
    /// command was delivered twice, and that should be visible.
    pub fn apply_close(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_created()?;
        if self.is_closed() {
            return Err(DomainError::conflict("bill is already closed"));
        }
        self.closed_on = Some(at);
        Ok(())
    }

    /// Running total with `amount` added, or `Validation` if it would overflow.
    fn total_after(&self, amount: f64) -> DomainResult<i64> {
        self.total_cents
            .checked_add(round2_cents(amount))
            .ok_or_else(|| DomainError::validation("bill total is too large"))
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::conflict("bill is closed"));
        }
        Ok(())
    }

    fn ensure_bill_id(&self, bill_id: BillId) -> DomainResult<()> {
        if self.id != bill_id {
            return Err(DomainError::invariant("bill_id mismatch"));
        }
        Ok(())
    }
}

/// Line item amounts must be finite, strictly positive and representable in cents.
pub fn validate_amount(amount: f64) -> DomainResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DomainError::validation("amount must be greater than 0"));
    }
    if amount * 100.0 >= MAX_CENTS {
        return Err(DomainError::validation("amount is too large"));
    }
    Ok(())
}

impl AggregateRoot for Bill {
    type Id = BillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBill {
    pub bill_id: BillId,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Command: AddLineItem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLineItem {
    pub bill_id: BillId,
    pub description: String,
    pub amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseBill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseBill {
    pub bill_id: BillId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillCommand {
    CreateBill(CreateBill),
    AddLineItem(AddLineItem),
    CloseBill(CloseBill),
}

impl Command for BillCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            BillCommand::CreateBill(c) => c.bill_id.aggregate_id(),
            BillCommand::AddLineItem(c) => c.bill_id.aggregate_id(),
            BillCommand::CloseBill(c) => c.bill_id.aggregate_id(),
        }
    }
}

/// Event: BillCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillCreated {
    pub bill_id: BillId,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Event: LineItemAdded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemAdded {
    pub bill_id: BillId,
    pub description: String,
    pub amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillClosed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillClosed {
    pub bill_id: BillId,
    pub closed_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillEvent {
    BillCreated(BillCreated),
    LineItemAdded(LineItemAdded),
    BillClosed(BillClosed),
}

impl Event for BillEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BillEvent::BillCreated(_) => "billing.bill.created",
            BillEvent::LineItemAdded(_) => "billing.bill.line_item_added",
            BillEvent::BillClosed(_) => "billing.bill.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BillEvent::BillCreated(e) => e.created_at,
            BillEvent::LineItemAdded(e) => e.occurred_at,
            BillEvent::BillClosed(e) => e.closed_on,
        }
    }
}

impl Aggregate for Bill {
    type Command = BillCommand;
    type Event = BillEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BillEvent::BillCreated(e) => {
                self.id = e.bill_id;
                self.currency = e.currency;
                self.line_items = Vec::new();
                self.total_cents = 0;
                self.created_at = e.created_at;
                self.closed_on = None;
                self.created = true;
            }
            BillEvent::LineItemAdded(e) => {
                // Decided events were checked against the running total.
                self.total_cents = self.total_cents.saturating_add(round2_cents(e.amount));
                self.line_items.push(LineItem {
                    description: e.description.clone(),
                    amount: e.amount,
                    created_at: e.occurred_at,
                });
            }
            BillEvent::BillClosed(e) => {
                self.closed_on = Some(e.closed_on);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BillCommand::CreateBill(cmd) => self.handle_create(cmd),
            BillCommand::AddLineItem(cmd) => self.handle_add_line_item(cmd),
            BillCommand::CloseBill(cmd) => self.handle_close(cmd),
        }
    }
}

impl Bill {
    fn handle_create(&self, cmd: &CreateBill) -> Result<Vec<BillEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("bill already exists"));
        }
        self.ensure_bill_id(cmd.bill_id)?;

        Ok(vec![BillEvent::BillCreated(BillCreated {
            bill_id: cmd.bill_id,
            currency: cmd.currency,
            created_at: cmd.created_at,
        })])
    }

    fn handle_add_line_item(&self, cmd: &AddLineItem) -> Result<Vec<BillEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_bill_id(cmd.bill_id)?;
        validate_amount(cmd.amount)?;
        self.ensure_open()?;
        self.total_after(cmd.amount)?;

        Ok(vec![BillEvent::LineItemAdded(LineItemAdded {
            bill_id: cmd.bill_id,
            description: cmd.description.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseBill) -> Result<Vec<BillEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_bill_id(cmd.bill_id)?;

        if self.is_closed() {
            return Err(DomainError::conflict("bill is already closed"));
        }

        Ok(vec![BillEvent::BillClosed(BillClosed {
            bill_id: cmd.bill_id,
            closed_on: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tally_events::execute;

    fn test_bill_id() -> BillId {
        BillId::generate()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn add(bill_id: BillId, description: &str, amount: f64, at: DateTime<Utc>) -> BillCommand {
        BillCommand::AddLineItem(AddLineItem {
            bill_id,
            description: description.to_string(),
            amount,
            occurred_at: at,
        })
    }

    fn close(bill_id: BillId, at: DateTime<Utc>) -> BillCommand {
        BillCommand::CloseBill(CloseBill {
            bill_id,
            occurred_at: at,
        })
    }

    fn created_bill(currency: Currency) -> Bill {
        let id = test_bill_id();
        let mut bill = Bill::empty(id);
        execute(
            &mut bill,
            &BillCommand::CreateBill(CreateBill {
                bill_id: id,
                currency,
                created_at: t0(),
            }),
        )
        .unwrap();
        bill
    }

    #[test]
    fn create_bill_starts_open_and_empty() {
        let bill = created_bill(Currency::Usd);

        assert!(bill.is_created());
        assert_eq!(bill.currency(), Currency::Usd);
        assert!(bill.line_items().is_empty());
        assert_eq!(bill.total_amount(), 0.0);
        assert_eq!(bill.created_at(), t0());
        assert_eq!(bill.closed_on(), None);
        assert_eq!(bill.status(), BillStatus::Open);
        assert_eq!(bill.version(), 1);
    }

    #[test]
    fn create_twice_is_conflict() {
        let bill = created_bill(Currency::Gel);
        let err = bill
            .handle(&BillCommand::CreateBill(CreateBill {
                bill_id: bill.id_typed(),
                currency: Currency::Usd,
                created_at: t0(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn two_items_sum_to_twenty_one() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();

        execute(&mut bill, &add(id, "item1", 10.0, t0())).unwrap();
        execute(&mut bill, &add(id, "item2", 11.0, t0() + Duration::seconds(1))).unwrap();

        assert_eq!(bill.line_items().len(), 2);
        assert_eq!(bill.total_amount(), 21.0);
        assert_eq!(bill.line_items()[0].description, "item1");
        assert_eq!(bill.line_items()[0].amount, 10.0);
        assert_eq!(bill.line_items()[1].description, "item2");
        assert_eq!(bill.line_items()[1].amount, 11.0);
        assert_eq!(bill.line_items()[1].created_at, t0() + Duration::seconds(1));
    }

    #[test]
    fn rounding_is_applied_per_item_not_on_total() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();

        // 0.004 + 0.004 would round to 0.01 on the total; per item each is 0.00.
        execute(&mut bill, &add(id, "a", 0.004, t0())).unwrap();
        execute(&mut bill, &add(id, "b", 0.004, t0())).unwrap();
        execute(&mut bill, &add(id, "c", 0.125, t0())).unwrap();

        assert_eq!(bill.total_cents(), 13);
        assert_eq!(bill.total_cents(), bill.recomputed_total_cents());
    }

    #[test]
    fn non_positive_amount_is_rejected_without_mutation() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();
        execute(&mut bill, &add(id, "item1", 10.0, t0())).unwrap();
        let before = bill.clone();

        for amount in [-10.0, 0.0, f64::NAN, f64::INFINITY] {
            let err = execute(&mut bill, &add(id, "bad", amount, t0())).unwrap_err();
            assert_eq!(err, DomainError::validation("amount must be greater than 0"));
        }

        assert_eq!(bill, before);
    }

    #[test]
    fn amount_beyond_cent_range_is_rejected() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();
        let before = bill.clone();

        for amount in [1e300, 1e17, f64::MAX] {
            let err = execute(&mut bill, &add(id, "big", amount, t0())).unwrap_err();
            assert_eq!(err, DomainError::validation("amount is too large"));
        }
        assert_eq!(bill, before);

        execute(&mut bill, &add(id, "small", 1.0, t0())).unwrap();
        execute(&mut bill, &close(id, t0())).unwrap();
        assert_eq!(bill.total_cents(), 100);
    }

    #[test]
    fn total_overflow_is_rejected_and_bill_stays_open() {
        let mut bill = created_bill(Currency::Gel);
        let id = bill.id_typed();
        execute(&mut bill, &add(id, "near limit", 9.0e16, t0())).unwrap();
        let before = bill.clone();

        let err = execute(&mut bill, &add(id, "again", 9.0e16, t0())).unwrap_err();
        assert_eq!(err, DomainError::validation("bill total is too large"));
        assert_eq!(bill, before);

        let mut direct = before.clone();
        let err = direct
            .apply_line_item(LineItem {
                description: "again".to_string(),
                amount: 9.0e16,
                created_at: t0(),
            })
            .unwrap_err();
        assert_eq!(err, DomainError::validation("bill total is too large"));
        assert_eq!(direct, before);

        execute(&mut bill, &add(id, "small", 1.0, t0())).unwrap();
        assert_eq!(bill.line_items().len(), 2);
        assert_eq!(bill.total_cents(), bill.recomputed_total_cents());
        execute(&mut bill, &close(id, t0())).unwrap();
        assert!(bill.is_closed());
    }

    #[test]
    fn close_sets_closed_on_and_second_close_is_rejected() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();
        let closed_at = t0() + Duration::minutes(5);

        execute(&mut bill, &close(id, closed_at)).unwrap();
        assert_eq!(bill.closed_on(), Some(closed_at));
        assert_eq!(bill.status(), BillStatus::Closed);

        let err = execute(&mut bill, &close(id, closed_at + Duration::minutes(1))).unwrap_err();
        assert_eq!(err, DomainError::conflict("bill is already closed"));
        assert_eq!(bill.closed_on(), Some(closed_at));
    }

    #[test]
    fn items_cannot_be_added_after_close() {
        let mut bill = created_bill(Currency::Usd);
        let id = bill.id_typed();
        execute(&mut bill, &add(id, "item1", 10.0, t0())).unwrap();
        execute(&mut bill, &close(id, t0())).unwrap();

        let err = execute(&mut bill, &add(id, "late", 5.0, t0())).unwrap_err();
        assert_eq!(err, DomainError::conflict("bill is closed"));
        assert_eq!(bill.line_items().len(), 1);
        assert_eq!(bill.total_amount(), 10.0);
    }

    #[test]
    fn commands_on_uncreated_bill_are_not_found() {
        let id = test_bill_id();
        let bill = Bill::empty(id);

        assert_eq!(bill.handle(&add(id, "x", 1.0, t0())).unwrap_err(), DomainError::NotFound);
        assert_eq!(bill.handle(&close(id, t0())).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn command_for_another_bill_is_rejected() {
        let bill = created_bill(Currency::Usd);
        let err = bill.handle(&add(test_bill_id(), "x", 1.0, t0())).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn commands_target_their_bill() {
        let id = test_bill_id();
        let create = BillCommand::CreateBill(CreateBill {
            bill_id: id,
            currency: Currency::Usd,
            created_at: t0(),
        });
        for cmd in [create, add(id, "x", 1.0, t0()), close(id, t0())] {
            assert_eq!(cmd.target_aggregate_id(), id.aggregate_id());
        }
    }

    #[test]
    fn entity_operations_enforce_the_same_rules() {
        let mut bill = Bill::open(test_bill_id(), Currency::Gel, t0());

        bill.apply_line_item(LineItem {
            description: "coffee".to_string(),
            amount: 4.5,
            created_at: t0(),
        })
        .unwrap();
        assert_eq!(
            bill.apply_line_item(LineItem {
                description: "refund".to_string(),
                amount: -4.5,
                created_at: t0(),
            }),
            Err(DomainError::validation("amount must be greater than 0"))
        );

        bill.apply_close(t0()).unwrap();
        assert_eq!(
            bill.apply_close(t0()),
            Err(DomainError::conflict("bill is already closed"))
        );
        assert_eq!(
            bill.apply_line_item(LineItem {
                description: "late".to_string(),
                amount: 1.0,
                created_at: t0(),
            }),
            Err(DomainError::conflict("bill is closed"))
        );
        assert_eq!(bill.total_cents(), 450);
    }

    #[test]
    fn replay_rebuilds_identical_state() {
        let mut bill = created_bill(Currency::Gel);
        let id = bill.id_typed();
        let created = BillEvent::BillCreated(BillCreated {
            bill_id: id,
            currency: Currency::Gel,
            created_at: t0(),
        });

        let mut history = vec![created];
        history.extend(execute(&mut bill, &add(id, "tea", 3.333, t0())).unwrap());
        history.extend(execute(&mut bill, &add(id, "cake", 7.5, t0())).unwrap());
        history.extend(execute(&mut bill, &close(id, t0())).unwrap());

        let replayed = Bill::replay(id, &history);
        assert_eq!(replayed, bill);
        assert_eq!(replayed.version(), 4);
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = BillEvent::LineItemAdded(LineItemAdded {
            bill_id: test_bill_id(),
            description: "item1".to_string(),
            amount: 10.0,
            occurred_at: t0(),
        });
        let json = serde_json::to_value(&event).unwrap();
        let back: BillEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.event_type(), "billing.bill.line_item_added");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// The running total always equals the per-item rounded sum.
        #[test]
        fn total_matches_sum_of_rounded_items(
            amounts in prop::collection::vec(0.01f64..100_000.0f64, 0..20)
        ) {
            let mut bill = created_bill(Currency::Usd);
            let id = bill.id_typed();

            let mut expected = 0i64;
            for (idx, amount) in amounts.iter().enumerate() {
                execute(&mut bill, &add(id, &format!("item{idx}"), *amount, t0())).unwrap();
                expected += round2_cents(*amount);
            }

            prop_assert_eq!(bill.line_items().len(), amounts.len());
            prop_assert_eq!(bill.total_cents(), expected);
            prop_assert_eq!(bill.total_cents(), bill.recomputed_total_cents());
        }
    }
}

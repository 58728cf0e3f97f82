use tally_core::AggregateId;

/// A command targets a specific aggregate instance.
///
/// Commands are intent; they are rejected when invalid and turned into events
/// when accepted. The target id lets the runtime route a command to the one
/// actor that owns that aggregate.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}

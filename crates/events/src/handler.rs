use tally_core::Aggregate;

/// Execute an aggregate command in place (no IO, no async).
///
/// 1. **Decide**: `aggregate.handle(command)` produces events without mutating.
/// 2. **Evolve**: each event is applied in order.
///
/// A rejected command leaves the aggregate untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}

/// Execute a command with a commit step between decision and state evolution.
///
/// `commit` receives the decided events and the aggregate version they build
/// on. Only when it succeeds are the events applied; if it fails, the error is
/// returned and the aggregate is untouched. This is how the bill actor
/// checkpoints each transition before making it visible.
pub fn execute_committed<A, F, E>(
    aggregate: &mut A,
    command: &A::Command,
    commit: F,
) -> Result<Vec<A::Event>, E>
where
    A: Aggregate,
    E: From<A::Error>,
    F: FnOnce(&[A::Event], u64) -> Result<(), E>,
{
    let events = A::handle(aggregate, command).map_err(E::from)?;
    if events.is_empty() {
        return Ok(events);
    }

    commit(&events, aggregate.version())?;

    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}

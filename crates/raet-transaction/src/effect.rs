/// What the application learns about a completed or failed conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Message { from: u32, body: serde_json::Value },
    Failed { to: u32, reason: String },
}

/// A side effect produced by a transaction's `receive`/`process` step.
///
/// Transactions never touch the socket, the keep store, or the application
/// inbox directly -- they return the effects they want, and the stack
/// driver (the sole owner of those resources) applies them. This keeps the
/// state machines trivially unit-testable and honors the "never take
/// owning references in either direction" design note: a transaction knows
/// only the eid/tid/sid it's about, never a live handle back into the
/// stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send packed bytes to a destination (host, port).
    Send { bytes: Vec<u8>, host: String, port: u16 },
    /// Hand a delivered message or a delivery failure to the application.
    Deliver(Delivery),
    /// Re-dump the local estate's keeps (eid was just assigned, or sid rolled).
    PersistLocal,
    /// Re-dump the given remote's keeps (Join or Allow just completed).
    PersistRemote(u32),
    /// Increment a named stat counter.
    Stat(&'static str),
}

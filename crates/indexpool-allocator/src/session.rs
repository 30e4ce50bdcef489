//! Transaction ownership for a single allocation call.

/// Who owns the lifecycle of the transaction an allocation runs in.
///
/// With [`Session::CallerManaged`] the engine only reads and writes
/// inside the borrowed transaction. It never commits or rolls it back and
/// never retries; every outcome, including a conflict that left partial
/// claims in the transaction, is reported for the caller to act on.
///
/// With [`Session::EngineManaged`] the engine begins, commits and rolls
/// back its own transactions and retries transient store failures.
#[derive(Debug)]
pub enum Session<'a, T> {
    /// Run inside the caller's transaction.
    CallerManaged(&'a mut T),
    /// Let the engine open and finish its own transaction.
    EngineManaged,
}

impl<'a, T> Session<'a, T> {
    /// Borrow the caller's transaction.
    pub fn caller(tx: &'a mut T) -> Self {
        Self::CallerManaged(tx)
    }

    /// Engine-owned transaction.
    pub fn engine() -> Self {
        Self::EngineManaged
    }
}

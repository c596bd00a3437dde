//! Notification hook invoked around variable reads and writes.

use crate::variable::Variable;

/// Kind of access being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Called right before the values are copied into the response.
    Read,
    /// Called right after the new values have been stored.
    Write,
}

/// Receives the variables touched by a read or write command.
///
/// Only one hook is active at a time; registering a new one replaces the old.
/// Closures taking `(Operation, &[&Variable])` implement this trait.
pub trait Hook: Send {
    fn notify(&self, op: Operation, variables: &[&Variable]);
}

impl<F> Hook for F
where
    F: Fn(Operation, &[&Variable]) + Send,
{
    fn notify(&self, op: Operation, variables: &[&Variable]) {
        self(op, variables)
    }
}

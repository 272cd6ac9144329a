use std::any::TypeId;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use thiserror::Error;

/// Consistency failure in the shared reference-count state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError
{
    /// A handle-to-handle assignment found no account for the source
    /// handle's target. A live source handle guarantees at least one
    /// reference, so an absent account means the ledger was corrupted.
    #[error("source handle's target at {addr:#x} has no ledger account")]
    UntrackedSource
    {
        addr: usize
    },
}

/// Outcome of decrementing an account, handed back to the handle that
/// performed the decrement. Freeing the object is the handle's job; the
/// ledger never runs destructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release
{
    /// The count went 1 to 0 and the account was removed. The caller holds
    /// release authority and must free the object.
    LastHandle,

    /// Other live handles remain; nothing to free.
    StillShared,

    /// No account for this identity. Tolerated anomaly, nothing to free.
    Untracked,
}

/// Per-element-type accounts: address of an owned object mapped to the
/// number of live handles referencing it. Accounts exist only while their
/// count is positive.
type Accounts = HashMap<usize, NonZeroUsize>;

struct Ledger(HashMap<TypeId, Accounts>);

lazy_static! {
    static ref LEDGER: Mutex<Ledger> = Mutex::new(Ledger(HashMap::new()));
}

impl Ledger
{
    fn accounts_of<T: 'static>(&mut self) -> &mut Accounts
    {
        self.0.entry(TypeId::of::<T>()).or_default()
    }

    fn retain<T: 'static>(&mut self, addr: usize)
    {
        self.accounts_of::<T>()
            .entry(addr)
            .and_modify(|count| *count = count.checked_add(1).expect("reference count overflow"))
            .or_insert(NonZeroUsize::MIN);
    }

    fn retain_tracked<T: 'static>(&mut self, addr: usize) -> Result<(), LedgerError>
    {
        match self.accounts_of::<T>().get_mut(&addr) {
            Some(count) => {
                *count = count.checked_add(1).expect("reference count overflow");
                Ok(())
            }
            None => Err(LedgerError::UntrackedSource { addr }),
        }
    }

    fn release<T: 'static>(&mut self, addr: usize) -> Release
    {
        let accounts = self.accounts_of::<T>();
        match accounts.get_mut(&addr) {
            None => Release::Untracked,
            Some(count) => match NonZeroUsize::new(count.get() - 1) {
                Some(rest) => {
                    *count = rest;
                    Release::StillShared
                }
                None => {
                    accounts.remove(&addr);
                    Release::LastHandle
                }
            },
        }
    }

    fn count_of<T: 'static>(&self, addr: usize) -> Option<usize>
    {
        self.0
            .get(&TypeId::of::<T>())?
            .get(&addr)
            .copied()
            .map(NonZeroUsize::get)
    }
}

/// Increment the account for `addr`, opening it at 1 if absent.
pub(crate) fn retain<T: 'static>(addr: usize) { LEDGER.lock().retain::<T>(addr) }

/// Increment the account for `addr` only if it already exists. A live
/// source handle is expected to have one; an absent account is reported
/// as corrupted state, never opened fresh.
pub(crate) fn retain_tracked<T: 'static>(addr: usize) -> Result<(), LedgerError>
{
    LEDGER.lock().retain_tracked::<T>(addr)
}

/// Decrement the account for `addr`, removing it on the 1 to 0 transition.
pub(crate) fn release<T: 'static>(addr: usize) -> Release { LEDGER.lock().release::<T>(addr) }

/// Current count for `addr`, if tracked.
pub(crate) fn count_of<T: 'static>(addr: usize) -> Option<usize>
{
    LEDGER.lock().count_of::<T>(addr)
}

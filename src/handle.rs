use std::fmt;
use std::ptr;

use crate::ledger::{self, LedgerError, Release};

/// Shared-ownership handle to a heap-allocated object.
///
/// Every live handle for an address contributes exactly 1 to that address'
/// account in the crate-wide ledger. The handle that performs the 1 to 0
/// decrement frees the object; no single handle owns it outright.
///
/// A handle may be empty (null identity). Empty handles never touch the
/// ledger and are always safe to destroy or reassign.
///
/// `Shared` holds a raw pointer and is therefore neither `Send` nor `Sync`;
/// handle operations are single-threaded by construction, while the ledger
/// itself is mutex-guarded either way.
pub struct Shared<T: 'static>
{
    ptr: *mut T,
}

impl<T: 'static> Shared<T>
{
    /// The empty handle, referencing nothing.
    pub fn null() -> Self { Shared { ptr: ptr::null_mut() } }

    /// Allocate `it` on the heap and take shared ownership of it.
    pub fn new(it: T) -> Self { unsafe { Self::adopt(Box::into_raw(Box::new(it))) } }

    /// Take shared ownership of a raw allocation.
    ///
    /// Opens a ledger account for `ptr` at a count of 1, or joins the
    /// existing account if the address is already tracked. A null `ptr`
    /// yields the empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or obtained from `Box::into_raw` and freed by
    /// nothing other than the last handle referencing it. The address must
    /// not be reused for another allocation of `T` while any handle still
    /// references it.
    pub unsafe fn adopt(ptr: *mut T) -> Self
    {
        if !ptr.is_null() {
            ledger::retain::<T>(ptr as usize);
        }
        Shared { ptr }
    }

    /// Raw pointer to the referenced object; null for the empty handle.
    ///
    /// Mirrors raw-pointer member access: no null check is made here or
    /// by anything the pointer is later passed to.
    pub fn as_ptr(&self) -> *mut T { self.ptr }

    /// Whether this is the empty handle.
    pub fn is_null(&self) -> bool { self.ptr.is_null() }

    /// Reference to the referenced object.
    ///
    /// # Safety
    ///
    /// The handle must not be empty. There is no null check; calling this
    /// on an empty handle is undefined behavior, the same contract as
    /// dereferencing the raw pointer.
    pub unsafe fn value(&self) -> &T { &*self.ptr }

    /// Number of live handles referencing this handle's target, read from
    /// the ledger. `None` for the empty handle or an untracked target.
    pub fn ref_count(&self) -> Option<usize>
    {
        if self.ptr.is_null() {
            None
        } else {
            ledger::count_of::<T>(self.ptr as usize)
        }
    }

    /// Repoint this handle at a raw allocation.
    ///
    /// A no-op when `ptr` equals the current identity. Otherwise the old
    /// target is released exactly as on destruction (freed if this was its
    /// last handle), and the account for a non-null `ptr` is incremented,
    /// opening at 1 if absent.
    ///
    /// # Safety
    ///
    /// Same contract as [`Shared::adopt`].
    pub unsafe fn assign_raw(&mut self, ptr: *mut T)
    {
        if ptr == self.ptr {
            return;
        }
        self.release_target();
        self.ptr = ptr;
        if !ptr.is_null() {
            ledger::retain::<T>(ptr as usize);
        }
    }

    /// Repoint this handle at another handle's target.
    ///
    /// A no-op when the two handles already share identity. Otherwise the
    /// old target is released exactly as on destruction and the identity is
    /// set to the source's. A live source handle guarantees its target has
    /// a ledger account; finding none is corrupted shared state and comes
    /// back as [`LedgerError::UntrackedSource`], with this handle already
    /// rebound to the untracked identity and contributing nothing to it.
    pub fn assign(&mut self, source: &Shared<T>) -> Result<(), LedgerError>
    {
        if self.ptr == source.ptr {
            return Ok(());
        }
        self.release_target();
        self.ptr = source.ptr;
        if self.ptr.is_null() {
            return Ok(());
        }
        ledger::retain_tracked::<T>(self.ptr as usize)
    }

    /// Decrement the current target's account, freeing the object on the
    /// 1 to 0 transition. An untracked identity is a tolerated anomaly:
    /// warn and free nothing.
    ///
    /// Leaves `self.ptr` as-is; callers rebind or drop it.
    fn release_target(&mut self)
    {
        if self.ptr.is_null() {
            return;
        }
        match ledger::release::<T>(self.ptr as usize) {
            Release::StillShared => {}
            Release::LastHandle => unsafe {
                drop(Box::from_raw(self.ptr));
            },
            Release::Untracked => {
                log::warn!(
                    "releasing a handle whose target at {:#x} has no ledger account",
                    self.ptr as usize
                );
            }
        }
    }
}

impl<T: 'static> Clone for Shared<T>
{
    /// Copy-construction: same identity, one more live handle.
    ///
    /// Like [`Shared::adopt`], this opens the account at 1 if the identity
    /// is untracked, rather than treating that as corrupted state the way
    /// [`Shared::assign`] does.
    fn clone(&self) -> Self { unsafe { Self::adopt(self.ptr) } }
}

impl<T: 'static> Default for Shared<T>
{
    fn default() -> Self { Self::null() }
}

impl<T: 'static> Drop for Shared<T>
{
    fn drop(&mut self) { self.release_target(); }
}

impl<T: 'static> PartialEq for Shared<T>
{
    /// Identity comparison: equal iff the addresses are equal, regardless
    /// of the pointed-to values.
    fn eq(&self, other: &Self) -> bool { ptr::eq(self.ptr, other.ptr) }
}

impl<T: 'static> Eq for Shared<T> {}

impl<T: 'static> fmt::Debug for Shared<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Shared").field("ptr", &self.ptr).finish()
    }
}

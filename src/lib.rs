//! Shared-ownership smart pointers backed by a per-type reference-count
//! ledger.
//!
//! The handle type [`Shared`] wraps a raw heap allocation and frees it
//! exactly when the last handle referencing it disappears. Unlike `Rc`,
//! the counts do not live next to the objects: they live in a process-wide
//! ledger mapping each object's address to its live-handle count, one set
//! of accounts per element type. Handles consult and mutate the ledger on
//! construction, cloning, assignment, and destruction; there is no other
//! moving part, and release is synchronous at the 1 to 0 decrement.
//!
//! The side-table design exists for embeddings where object addresses are
//! handed around as raw pointers and several handles are constructed from
//! the same address independently; they all meet in the same account.
//!
//! ```
//! use refledger::Shared;
//!
//! let first = Shared::new(String::from("shared"));
//! let second = first.clone();
//!
//! assert_eq!(first, second);
//! assert_eq!(second.ref_count(), Some(2));
//! assert_eq!(unsafe { second.value() }, "shared");
//!
//! drop(first);
//! assert_eq!(second.ref_count(), Some(1));
//! // dropping `second` frees the string
//! ```
//!
//! Handles are single-threaded (`Shared` is `!Send`); the ledger itself is
//! mutex-guarded, so the shared state stays coherent even when distinct
//! element types are handled from distinct threads.

pub mod handle;
pub(crate) mod ledger;

pub use handle::Shared;
pub use ledger::LedgerError;

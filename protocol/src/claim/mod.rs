//! # Claim Module: Cumulative Claim Reconciliation
//!
//! Claiming side of the airdrop. A recipient's allocation in the tree is a
//! lifetime total; the ledger remembers how much of it was already paid.
//! What can be unlocked right now is the difference, and the ledger is only
//! ever asked to move the claimed balance up to the committed total.
//!
//! ```text
//! ledger.rs: Ledger trait (the only way out of the process)
//! reconciler.rs: ClaimState machine and the claim sequence
//! publish.rs: Idempotent root publication with read-back
//! ```

pub mod ledger;
pub mod publish;
pub mod reconciler;

pub use ledger::{Ledger, LedgerError, TxHash};
pub use publish::{publish_root, RootUpdate};
pub use reconciler::{ClaimReceipt, ClaimReconciler, ClaimState};

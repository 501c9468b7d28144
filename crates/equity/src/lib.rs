//! `crewpay-equity` — per-year equity-election lock.
//!
//! A contractor's equity/cash split freezes for a calendar year the first
//! time an invoice is submitted under it. There is deliberately no unlock or
//! administrative override: the only way an election becomes mutable again is
//! the arrival of a new billing year, which is a new key, not a mutation.

pub mod election;

pub use election::{ElectionBook, EquityElection};

//! `crewpay-contractors` — contractor profiles and tax-compliance gating.
//!
//! How tax forms are collected (e-signature flows, W-9/W-8 uploads) is the
//! outer product's concern; this crate only tracks *whether* sufficient tax
//! data is on file and answers the payability gate from that fact.

pub mod profile;
pub mod tax;

pub use profile::{
    Contractor, ContractorCommand, ContractorError, ContractorEvent, ContractorRef,
    ContractorRegistered, RecordTaxInfo, RegisterContractor, TaxInfoRecorded,
};
pub use tax::{TaxComplianceGate, TaxInfoGate};

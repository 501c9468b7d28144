//! `crewpay-invoicing` — invoice lifecycle and payability gate.
//!
//! This crate contains the business rules that decide, for a given invoice
//! and acting user, whether the invoice can be edited, approved, or paid,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). Hosts supply invoice snapshots and a [`CompanyContext`] and
//! durably apply the returned transitions.
//!
//! [`CompanyContext`]: crewpay_company::CompanyContext

pub mod invoice;
pub mod policy;
pub mod workflow;

pub use invoice::{
    Approval, ApproveInvoice, DraftInvoice, Invoice, InvoiceCommand, InvoiceDrafted, InvoiceEvent,
    InvoiceId, InvoiceLine, InvoicePaid, InvoiceRejected, InvoiceStatus, InvoiceSubmitted,
    InvoiceUpdated, PayInvoice, RejectInvoice, SubmitInvoice, UpdateInvoice,
};
pub use policy::{ActionAvailability, ApprovalPolicy};
pub use workflow::{BatchRequest, InvoiceAction, InvoiceWorkflow};

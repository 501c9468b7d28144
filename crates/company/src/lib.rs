//! `crewpay-company` — company-scoped configuration consumed by the payment core.
//!
//! The host resolves this context from its own config/session sources and
//! passes it explicitly into every evaluation; the core never looks anything
//! up ambiently.

pub mod context;

pub use context::{CompanyContext, CompanyContextError, CompanyFeatures};

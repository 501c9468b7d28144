use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crewpay_core::{Aggregate, AggregateRoot, CompanyId, ContractorId};
use crewpay_events::Event;

/// Snapshot of the contractor facts an invoice carries.
///
/// Invoices embed this instead of referencing the profile aggregate so that
/// payability evaluation works over a self-contained invoice snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorRef {
    pub contractor_id: ContractorId,
    pub has_tax_info: bool,
}

/// Domain failures for contractor profile commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractorError {
    #[error("contractor already registered")]
    AlreadyRegistered,

    #[error("contractor not registered")]
    NotRegistered,

    #[error("company mismatch")]
    CompanyMismatch,

    #[error("contractor name must not be empty")]
    EmptyName,
}

/// Aggregate root: Contractor profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contractor {
    id: ContractorId,
    company_id: Option<CompanyId>,
    name: String,
    has_tax_info: bool,
    version: u64,
    registered: bool,
}

impl Contractor {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: ContractorId) -> Self {
        Self {
            id,
            company_id: None,
            name: String::new(),
            has_tax_info: false,
            version: 0,
            registered: false,
        }
    }

    pub fn id_typed(&self) -> ContractorId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_tax_info(&self) -> bool {
        self.has_tax_info
    }

    /// Snapshot for embedding into an invoice.
    pub fn snapshot(&self) -> ContractorRef {
        ContractorRef {
            contractor_id: self.id,
            has_tax_info: self.has_tax_info,
        }
    }
}

impl AggregateRoot for Contractor {
    type Id = ContractorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterContractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterContractor {
    pub company_id: CompanyId,
    pub contractor_id: ContractorId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTaxInfo — marks sufficient tax data as being on file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTaxInfo {
    pub company_id: CompanyId,
    pub contractor_id: ContractorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractorCommand {
    RegisterContractor(RegisterContractor),
    RecordTaxInfo(RecordTaxInfo),
}

/// Event: ContractorRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorRegistered {
    pub company_id: CompanyId,
    pub contractor_id: ContractorId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TaxInfoRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxInfoRecorded {
    pub company_id: CompanyId,
    pub contractor_id: ContractorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractorEvent {
    ContractorRegistered(ContractorRegistered),
    TaxInfoRecorded(TaxInfoRecorded),
}

impl Event for ContractorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContractorEvent::ContractorRegistered(_) => "contractors.contractor.registered",
            ContractorEvent::TaxInfoRecorded(_) => "contractors.contractor.tax_info_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ContractorEvent::ContractorRegistered(e) => e.occurred_at,
            ContractorEvent::TaxInfoRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Contractor {
    type Command = ContractorCommand;
    type Event = ContractorEvent;
    type Error = ContractorError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContractorEvent::ContractorRegistered(e) => {
                self.id = e.contractor_id;
                self.company_id = Some(e.company_id);
                self.name = e.name.clone();
                self.has_tax_info = false;
                self.registered = true;
            }
            ContractorEvent::TaxInfoRecorded(_) => {
                self.has_tax_info = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContractorCommand::RegisterContractor(cmd) => self.handle_register(cmd),
            ContractorCommand::RecordTaxInfo(cmd) => self.handle_record_tax_info(cmd),
        }
    }
}

impl Contractor {
    fn ensure_company(&self, company_id: CompanyId) -> Result<(), ContractorError> {
        if self.company_id != Some(company_id) {
            return Err(ContractorError::CompanyMismatch);
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterContractor) -> Result<Vec<ContractorEvent>, ContractorError> {
        if self.registered {
            return Err(ContractorError::AlreadyRegistered);
        }
        if cmd.name.trim().is_empty() {
            return Err(ContractorError::EmptyName);
        }

        Ok(vec![ContractorEvent::ContractorRegistered(
            ContractorRegistered {
                company_id: cmd.company_id,
                contractor_id: cmd.contractor_id,
                name: cmd.name.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_tax_info(&self, cmd: &RecordTaxInfo) -> Result<Vec<ContractorEvent>, ContractorError> {
        if !self.registered {
            return Err(ContractorError::NotRegistered);
        }
        self.ensure_company(cmd.company_id)?;

        // Re-recording is harmless (a refreshed form replaces the old one).
        Ok(vec![ContractorEvent::TaxInfoRecorded(TaxInfoRecorded {
            company_id: cmd.company_id,
            contractor_id: cmd.contractor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

//! Two-step I-card lookup for a single address
//!
//! 1. submit the address and read back the selection form
//! 2. post that form with the I-card view selected and read the results table
//!
//! [`LookupProtocol::lookup`] keeps every failure typed; [`LookupProtocol::execute`]
//! is the item boundary that folds failures into [`LookupOutcome::Failed`].

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::address::{AddressKey, WorkItem};
use crate::page::{PageError, PageInterpreter, ResultRows};
use crate::transport::{FormTransport, TransportError};

/// Form field naming the control that triggered the postback
pub const EVENT_TARGET_FIELD: &str = "__EVENTTARGET";

/// Form field carrying the postback argument (always empty here)
pub const EVENT_ARGUMENT_FIELD: &str = "__EVENTARGUMENT";

/// Result of looking up one address
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found { values: Vec<String> },
    NotFound,
    Failed { error: String },
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Anomalies seen during a lookup that did not stop it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupDiagnostics {
    /// Number of forms on the address page when it was more than one
    pub extra_forms: Option<usize>,
}

/// Outcome plus diagnostics, as returned at the item boundary
#[derive(Debug, Clone, PartialEq)]
pub struct LookupReport {
    pub outcome: LookupOutcome,
    pub diagnostics: LookupDiagnostics,
}

/// Copy the extracted fields and select the I-card view.
///
/// Existing event fields are replaced rather than duplicated so the server
/// sees exactly one target.
pub fn build_selection_payload(fields: Vec<(String, String)>, event_target: &str) -> Vec<(String, String)> {
    let mut payload: Vec<(String, String)> = fields
        .into_iter()
        .filter(|(name, _)| name != EVENT_TARGET_FIELD && name != EVENT_ARGUMENT_FIELD)
        .collect();
    payload.push((EVENT_TARGET_FIELD.to_string(), event_target.to_string()));
    payload.push((EVENT_ARGUMENT_FIELD.to_string(), String::new()));
    payload
}

pub struct LookupProtocol {
    transport: Arc<dyn FormTransport>,
    interpreter: Arc<dyn PageInterpreter>,
    event_target: String,
}

impl LookupProtocol {
    pub fn new(
        transport: Arc<dyn FormTransport>,
        interpreter: Arc<dyn PageInterpreter>,
        event_target: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            interpreter,
            event_target: event_target.into(),
        }
    }

    /// Run both steps for `key`. Only `Found` or `NotFound` are returned on success.
    pub async fn lookup(
        &self,
        key: &AddressKey,
        diagnostics: &mut LookupDiagnostics,
    ) -> Result<LookupOutcome, LookupError> {
        let mut session = self.transport.open_session().await?;

        let form_page = session.submit_address(key).await?;
        let form = self.interpreter.extract_form(&form_page)?;
        if form.has_multiple_forms() {
            warn!("{} forms found on lookup page for {}, using the first", form.form_count, key);
            diagnostics.extra_forms = Some(form.form_count);
        }

        let payload = build_selection_payload(form.fields, &self.event_target);
        let results_page = session.submit_form(&payload).await?;

        match self.interpreter.extract_result_rows(&results_page)? {
            ResultRows::Found(values) => {
                debug!("I-cards found for {}: {}", key, values.join(", "));
                Ok(LookupOutcome::Found { values })
            }
            ResultRows::NotFound => {
                debug!("No I-cards found for {}", key);
                Ok(LookupOutcome::NotFound)
            }
        }
    }

    /// Look up one work item. Never fails: errors become `LookupOutcome::Failed`.
    pub async fn execute(&self, item: &WorkItem) -> LookupReport {
        let mut diagnostics = LookupDiagnostics::default();
        let outcome = match self.lookup(&item.key, &mut diagnostics).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("Lookup failed for {}: {}", item.key, e);
                LookupOutcome::Failed { error: e.to_string() }
            }
        };
        LookupReport { outcome, diagnostics }
    }
}

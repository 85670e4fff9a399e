//! Directory-backed contact resolution.
//!
//! Fills a record's missing first-line contact before the pure ladder runs.
//! The directory is consulted only on demand. When it has no answer the
//! record is left as is and the ladder's stand-in rules pick the callee.

use std::sync::Arc;

use coordination::escalation::MissingContactPolicy;
use coordination::{phone, Contact, EscalationRecord, Ladder};
use tracing::{info, warn};

use crate::directory::Directory;

pub struct ContactResolver {
    directory: Option<Arc<dyn Directory>>,
}

impl ContactResolver {
    pub fn new(directory: Option<Arc<dyn Directory>>) -> Self {
        Self { directory }
    }

    /// Whether filling the contact could change how `ladder` resolves `record`.
    pub fn applies(&self, ladder: &Ladder, record: &EscalationRecord) -> bool {
        self.directory.is_some()
            && ladder.missing_contact == MissingContactPolicy::Directory
            && ladder.has_on_call()
            && !has_dialable_contact(record)
    }

    /// On-call contact for `emergency_type`, or `None` if the directory has
    /// no dialable number.
    pub async fn lookup(&self, emergency_type: &str) -> Option<Contact> {
        let directory = self.directory.as_ref()?;
        match directory.on_call(emergency_type).await {
            Ok(contact) if phone::dialable(&contact.phone).is_some() => Some(contact),
            Ok(contact) => {
                warn!(phone = %contact.phone, "directory returned an undialable phone");
                None
            }
            Err(e) => {
                warn!(error = %e, "directory lookup failed, falling back along the ladder");
                None
            }
        }
    }

    /// Fill `record`'s first-line contact in memory. Returns `true` if a
    /// contact was filled.
    pub async fn fill_on_call(&self, ladder: &Ladder, record: &mut EscalationRecord) -> bool {
        if has_dialable_contact(record) {
            return false;
        }
        let kind = ladder.emergency_type(record).to_string();
        match self.lookup(&kind).await {
            Some(contact) => {
                info!(record_id = %record.record_id, name = %contact.name, "filled on-call contact");
                record.contact_phone = Some(contact.phone);
                if !contact.name.is_empty() {
                    record.contact_name = Some(contact.name);
                }
                true
            }
            None => false,
        }
    }
}

fn has_dialable_contact(record: &EscalationRecord) -> bool {
    record
        .contact_phone
        .as_deref()
        .and_then(phone::dialable)
        .is_some()
}

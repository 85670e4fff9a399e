//! Contact Ladder: whom to call at each escalation step
//!
//! A ladder is configuration data: an ordered list of rungs, each occupying
//! `repeat` consecutive steps. Resolution is pure; anything that needs I/O
//! (directory lookups) happens before the record reaches this module.
//!
//! ```text
//! step:   1        2        3        4
//!         OnCall   OnCall   OnCall   ByEmergencyType ──► plumbing / hvac manager
//!         └──── repeat = 3 ───┘      (walking past the end stays here)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phone;
use crate::record::EscalationRecord;

/// A named phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

impl Contact {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// Route to `contact` when the record's emergency type contains `keyword`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRoute {
    pub keyword: String,
    pub contact: Contact,
}

/// What a rung dials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RungTarget {
    /// The record's own first-line contact.
    OnCall,
    /// A fixed named contact.
    Contact(Contact),
    /// Cycles through `contacts` on successive visits of the rung.
    Rotating { contacts: Vec<Contact> },
    /// Picks a contact by matching keywords against the emergency type.
    ByEmergencyType {
        #[serde(default)]
        routes: Vec<KeywordRoute>,
        default: Contact,
    },
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rung {
    #[serde(flatten)]
    pub target: RungTarget,
    /// Number of consecutive steps this rung occupies.
    #[serde(default = "one")]
    pub repeat: u32,
}

impl Rung {
    pub fn new(target: RungTarget) -> Self {
        Self { target, repeat: 1 }
    }

    pub fn repeated(target: RungTarget, repeat: u32) -> Self {
        Self { target, repeat }
    }
}

/// What to do with `OnCall` rungs when a record carries no dialable contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingContactPolicy {
    /// Drop `OnCall` rungs and start at the first fixed rung.
    SkipOnCall,
    /// Keep them; the caller fills the contact from the directory first.
    /// A step that is still without a contact is covered by the ladder's
    /// default contact, else by the next fixed rung.
    #[default]
    Directory,
}

/// Label passed to the voice agent so it can adapt its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPurpose {
    EmergencyNotification,
    EscalationCall,
    ManagerEscalationCall,
}

impl CallPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyNotification => "emergency_notification",
            Self::EscalationCall => "escalation_call",
            Self::ManagerEscalationCall => "manager_escalation_call",
        }
    }
}

impl std::fmt::Display for CallPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved destination for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTarget {
    /// Normalized, dialable number.
    pub phone: String,
    pub display_name: String,
    pub purpose: CallPurpose,
}

/// A ladder that can never produce a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    #[error("ladder has no rungs")]
    Empty,
    #[error("rung {0} has repeat = 0")]
    ZeroRepeat(usize),
    #[error("rotating rung {0} has no contacts")]
    NoRotation(usize),
    #[error("contact {name:?} has an undialable phone number {phone:?}")]
    Undialable { name: String, phone: String },
}

const ON_CALL_NAME: &str = "On-call technician";

/// Ordered fallback contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ladder {
    pub rungs: Vec<Rung>,
    #[serde(default)]
    pub missing_contact: MissingContactPolicy,
    /// Stands in for a missing on-call contact.
    #[serde(default)]
    pub default_contact: Option<Contact>,
    /// Emergency type assumed for records that carry none.
    #[serde(default)]
    pub untyped_emergency: Option<String>,
}

impl Default for Ladder {
    fn default() -> Self {
        Self::on_call_then_manager(
            3,
            vec![KeywordRoute {
                keyword: "hvac".into(),
                contact: Contact::new("HVAC manager", ""),
            }],
            Contact::new("Plumbing manager", ""),
        )
    }
}

impl Ladder {
    pub fn new(rungs: Vec<Rung>) -> Self {
        Self {
            rungs,
            missing_contact: MissingContactPolicy::default(),
            default_contact: None,
            untyped_emergency: None,
        }
    }

    /// On-call contact `repeat` times, then a manager routed by emergency type.
    pub fn on_call_then_manager(repeat: u32, routes: Vec<KeywordRoute>, default: Contact) -> Self {
        Self::new(vec![
            Rung::repeated(RungTarget::OnCall, repeat),
            Rung::new(RungTarget::ByEmergencyType { routes, default }),
        ])
    }

    pub fn with_missing_contact(mut self, policy: MissingContactPolicy) -> Self {
        self.missing_contact = policy;
        self
    }

    pub fn with_default_contact(mut self, contact: Contact) -> Self {
        self.default_contact = Some(contact);
        self
    }

    pub fn with_untyped_emergency(mut self, kind: impl Into<String>) -> Self {
        self.untyped_emergency = Some(kind.into());
        self
    }

    /// Emergency type used for routing `record`.
    pub fn emergency_type<'a>(&'a self, record: &'a EscalationRecord) -> &'a str {
        let kind = record.emergency_type.trim();
        match &self.untyped_emergency {
            Some(assumed) if kind.is_empty() => assumed,
            _ => kind,
        }
    }

    /// Number of steps before the sticky tail begins.
    pub fn len(&self) -> u32 {
        self.rungs.iter().map(|r| r.repeat.max(1)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn has_on_call(&self) -> bool {
        self.rungs.iter().any(|r| r.target == RungTarget::OnCall)
    }

    /// Check that every rung can resolve to something dialable.
    pub fn validate(&self) -> Result<(), LadderError> {
        if self.rungs.is_empty() {
            return Err(LadderError::Empty);
        }
        let check = |contact: &Contact| match phone::dialable(&contact.phone) {
            Some(_) => Ok(()),
            None => Err(LadderError::Undialable {
                name: contact.name.clone(),
                phone: contact.phone.clone(),
            }),
        };
        for (index, rung) in self.rungs.iter().enumerate() {
            if rung.repeat == 0 {
                return Err(LadderError::ZeroRepeat(index));
            }
            match &rung.target {
                RungTarget::OnCall => {}
                RungTarget::Contact(contact) => check(contact)?,
                RungTarget::Rotating { contacts } => {
                    if contacts.is_empty() {
                        return Err(LadderError::NoRotation(index));
                    }
                    contacts.iter().try_for_each(check)?;
                }
                RungTarget::ByEmergencyType { routes, default } => {
                    check(default)?;
                    routes.iter().try_for_each(|route| check(&route.contact))?;
                }
            }
        }
        if let Some(contact) = &self.default_contact {
            check(contact)?;
        }
        Ok(())
    }

    /// Rungs that apply to `record` under the missing-contact policy.
    fn effective_rungs<'a>(&'a self, record: &EscalationRecord) -> Vec<&'a Rung> {
        let skip_on_call = self.missing_contact == MissingContactPolicy::SkipOnCall
            && on_call_phone(record).is_none();
        self.rungs
            .iter()
            .filter(|r| !(skip_on_call && r.target == RungTarget::OnCall))
            .collect()
    }

    /// Destination for `step` (1-indexed), or `None` if nothing dialable
    /// can be found for it.
    pub fn resolve_target(&self, step: u32, record: &EscalationRecord) -> Option<CallTarget> {
        if step == 0 {
            return None;
        }
        let rungs = self.effective_rungs(record);
        let (index, visit) = locate(&rungs, step)?;
        let kind = self.emergency_type(record);
        match resolve_rung(&rungs[index].target, visit, record, kind) {
            Some(target) => Some(target),
            None if rungs[index].target == RungTarget::OnCall => {
                self.stand_in(&rungs[index + 1..], record, kind)
            }
            None => None,
        }
    }

    /// Whether `step` falls on an on-call rung for `record`.
    pub fn is_on_call_step(&self, step: u32, record: &EscalationRecord) -> bool {
        let rungs = self.effective_rungs(record);
        step > 0
            && locate(&rungs, step)
                .is_some_and(|(index, _)| rungs[index].target == RungTarget::OnCall)
    }

    /// Destination for an on-call step whose record has no contact: the
    /// default contact, else the first later fixed rung that resolves.
    fn stand_in(&self, later: &[&Rung], record: &EscalationRecord, kind: &str) -> Option<CallTarget> {
        if let Some(target) = self
            .default_contact
            .as_ref()
            .and_then(|contact| contact_target(contact, CallPurpose::EmergencyNotification))
        {
            return Some(target);
        }
        later
            .iter()
            .filter(|rung| rung.target != RungTarget::OnCall)
            .find_map(|rung| resolve_rung(&rung.target, 0, record, kind))
    }
}

/// Free-function form of [`Ladder::resolve_target`].
pub fn resolve_target(step: u32, record: &EscalationRecord, ladder: &Ladder) -> Option<CallTarget> {
    ladder.resolve_target(step, record)
}

/// Index of the rung covering `step` and how many earlier steps visited it.
/// Steps past the end stay on the last rung.
fn locate(rungs: &[&Rung], step: u32) -> Option<(usize, u32)> {
    let mut start = 1u32;
    for (index, rung) in rungs.iter().enumerate() {
        let span = rung.repeat.max(1);
        if step < start + span {
            return Some((index, step - start));
        }
        start += span;
    }
    let last = rungs.last()?;
    let last_start = start - last.repeat.max(1);
    Some((rungs.len() - 1, step - last_start))
}

fn on_call_phone(record: &EscalationRecord) -> Option<String> {
    record.contact_phone.as_deref().and_then(phone::dialable)
}

fn contact_target(contact: &Contact, purpose: CallPurpose) -> Option<CallTarget> {
    Some(CallTarget {
        phone: phone::dialable(&contact.phone)?,
        display_name: contact.name.clone(),
        purpose,
    })
}

fn resolve_rung(
    target: &RungTarget,
    visit: u32,
    record: &EscalationRecord,
    kind: &str,
) -> Option<CallTarget> {
    match target {
        RungTarget::OnCall => Some(CallTarget {
            phone: on_call_phone(record)?,
            display_name: record
                .contact_name
                .clone()
                .unwrap_or_else(|| ON_CALL_NAME.to_string()),
            purpose: CallPurpose::EmergencyNotification,
        }),
        RungTarget::Contact(contact) => contact_target(contact, CallPurpose::EscalationCall),
        RungTarget::Rotating { contacts } => {
            if contacts.is_empty() {
                return None;
            }
            let contact = &contacts[visit as usize % contacts.len()];
            contact_target(contact, CallPurpose::EscalationCall)
        }
        RungTarget::ByEmergencyType { routes, default } => {
            let kind = kind.to_lowercase();
            let contact = routes
                .iter()
                .find(|route| {
                    let keyword = route.keyword.trim().to_lowercase();
                    !keyword.is_empty() && kind.contains(&keyword)
                })
                .map(|route| &route.contact)
                .unwrap_or(default);
            contact_target(contact, CallPurpose::ManagerEscalationCall)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_contact(phone: Option<&str>) -> EscalationRecord {
        let mut record = EscalationRecord::new("r1");
        record.is_emergency = true;
        record.contact_phone = phone.map(str::to_string);
        record
    }

    fn managers() -> Ladder {
        Ladder::on_call_then_manager(
            3,
            vec![KeywordRoute {
                keyword: "HVAC".into(),
                contact: Contact::new("Hvac Boss", "503-555-0101"),
            }],
            Contact::new("Plumbing Boss", "503-555-0102"),
        )
    }

    #[test]
    fn test_on_call_steps_use_record_contact() {
        let ladder = managers();
        let record = record_with_contact(Some("2063385620"));
        for step in 1..=3 {
            let target = ladder.resolve_target(step, &record).unwrap();
            assert_eq!(target.phone, "+12063385620");
            assert_eq!(target.purpose, CallPurpose::EmergencyNotification);
            assert_eq!(target.display_name, ON_CALL_NAME);
        }
    }

    #[test]
    fn test_manager_routed_by_emergency_type() {
        let ladder = managers();
        let mut record = record_with_contact(Some("2063385620"));
        record.emergency_type = "No heat - hvac failure".into();
        let target = ladder.resolve_target(4, &record).unwrap();
        assert_eq!(target.display_name, "Hvac Boss");
        assert_eq!(target.phone, "+15035550101");
        assert_eq!(target.purpose, CallPurpose::ManagerEscalationCall);

        record.emergency_type = "Burst pipe".into();
        let target = ladder.resolve_target(4, &record).unwrap();
        assert_eq!(target.display_name, "Plumbing Boss");
    }

    #[test]
    fn test_steps_past_the_end_are_sticky() {
        let ladder = managers();
        let record = record_with_contact(Some("2063385620"));
        assert_eq!(
            ladder.resolve_target(9, &record),
            ladder.resolve_target(4, &record)
        );
    }

    #[test]
    fn test_rotating_rung_alternates_and_keeps_counting() {
        let ladder = Ladder::new(vec![
            Rung::new(RungTarget::Contact(Contact::new("B", "5035550002"))),
            Rung::repeated(
                RungTarget::Rotating {
                    contacts: vec![
                        Contact::new("A", "5035550001"),
                        Contact::new("A (cell)", "5035550011"),
                    ],
                },
                2,
            ),
        ]);
        let record = record_with_contact(None);
        let names: Vec<String> = (1..=5)
            .map(|s| ladder.resolve_target(s, &record).unwrap().display_name)
            .collect();
        assert_eq!(names, ["B", "A", "A (cell)", "A", "A (cell)"]);
    }

    #[test]
    fn test_missing_contact_falls_through_to_manager() {
        let ladder = managers();
        let mut record = record_with_contact(Some("12"));
        record.emergency_type = "Burst pipe".into();
        for step in 1..=4 {
            let target = ladder.resolve_target(step, &record).unwrap();
            assert_eq!(target.display_name, "Plumbing Boss");
            assert_eq!(target.purpose, CallPurpose::ManagerEscalationCall);
        }
        assert!(ladder.is_on_call_step(1, &record));
        assert!(!ladder.is_on_call_step(4, &record));
    }

    #[test]
    fn test_default_contact_stands_in_for_on_call() {
        let ladder = managers().with_default_contact(Contact::new("Dispatch", "503-555-0199"));
        let record = record_with_contact(None);
        let target = ladder.resolve_target(2, &record).unwrap();
        assert_eq!(target.phone, "+15035550199");
        assert_eq!(target.display_name, "Dispatch");
        assert_eq!(target.purpose, CallPurpose::EmergencyNotification);
        assert_eq!(
            ladder.resolve_target(4, &record).unwrap().display_name,
            "Plumbing Boss"
        );
    }

    #[test]
    fn test_nothing_dialable_after_on_call() {
        let record = record_with_contact(None);
        assert_eq!(Ladder::default().resolve_target(1, &record), None);
        let only_on_call = Ladder::new(vec![Rung::repeated(RungTarget::OnCall, 2)]);
        assert_eq!(only_on_call.resolve_target(3, &record), None);
        assert!(only_on_call.is_on_call_step(3, &record));
    }

    #[test]
    fn test_untyped_emergency_routes_as_assumed_type() {
        let mut record = record_with_contact(Some("2063385620"));
        assert_eq!(
            managers().resolve_target(4, &record).unwrap().display_name,
            "Plumbing Boss"
        );

        let ladder = managers().with_untyped_emergency("HVAC");
        assert_eq!(ladder.resolve_target(4, &record).unwrap().display_name, "Hvac Boss");
        record.emergency_type = "Burst pipe".into();
        assert_eq!(ladder.emergency_type(&record), "Burst pipe");
        assert_eq!(
            ladder.resolve_target(4, &record).unwrap().display_name,
            "Plumbing Boss"
        );
    }

    #[test]
    fn test_skip_on_call_policy_starts_at_first_fixed_rung() {
        let ladder = managers().with_missing_contact(MissingContactPolicy::SkipOnCall);
        let record = record_with_contact(None);
        let first = ladder.resolve_target(1, &record).unwrap();
        assert_eq!(first.purpose, CallPurpose::ManagerEscalationCall);

        let with_contact = record_with_contact(Some("2063385620"));
        let first = ladder.resolve_target(1, &with_contact).unwrap();
        assert_eq!(first.purpose, CallPurpose::EmergencyNotification);
    }

    #[test]
    fn test_step_zero_and_empty_ladder() {
        let record = record_with_contact(Some("2063385620"));
        assert_eq!(managers().resolve_target(0, &record), None);
        assert_eq!(Ladder::new(Vec::new()).resolve_target(1, &record), None);
    }

    #[test]
    fn test_validate_flags_unusable_ladders() {
        assert_eq!(managers().validate(), Ok(()));
        assert_eq!(Ladder::new(Vec::new()).validate(), Err(LadderError::Empty));
        // The built-in default ships without manager numbers.
        assert!(matches!(
            Ladder::default().validate(),
            Err(LadderError::Undialable { .. })
        ));
        let ladder = Ladder::new(vec![Rung::repeated(RungTarget::OnCall, 0)]);
        assert_eq!(ladder.validate(), Err(LadderError::ZeroRepeat(0)));
    }

    #[test]
    fn test_len_counts_repeats() {
        assert_eq!(managers().len(), 4);
        assert!(managers().has_on_call());
    }
}

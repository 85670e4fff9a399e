//! Escalation Scheduler Core
//!
//! Pure, deterministic building blocks for outbound emergency call-outs:
//!
//! - [`phone`]: canonical `+1XXXXXXXXXX` number normalization
//! - [`flags`] and [`cell`]: interpretation of loosely typed stored values
//! - [`record`]: the persisted escalation state of one emergency event
//! - [`call`]: provider call status and per-attempt observations
//! - [`escalation`]: delay gate, contact ladder and the escalation state machine
//! - [`clock`]: injectable wall clock
//!
//! Nothing in this crate performs I/O. The `callout-agent` crate drives it
//! against a row store and a voice provider.

pub mod call;
pub mod cell;
pub mod clock;
pub mod escalation;
pub mod flags;
pub mod phone;
pub mod record;

pub use call::{CallObservation, CallStatus};
pub use cell::Cell;
pub use clock::{Clock, FixedClock, SystemClock};
pub use escalation::{
    CallPurpose, CallTarget, Contact, DelayAnchor, Effect, EngineConfig, EscalationAction,
    EscalationEngine, EscalationState, Ladder, PlacementKind,
};
pub use flags::{parse_flag, Flag};
pub use record::{EscalationOutcome, EscalationRecord};

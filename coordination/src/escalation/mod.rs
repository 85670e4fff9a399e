//! Escalation Engine: Deterministic State Machine for Call-Out Ladders
//!
//! Decides, for one emergency record at a time, whether to place the next
//! outbound call, wait, or stop. This is a pure state machine with no I/O;
//! the runtime polls the provider and feeds observations back in.
//!
//! # Escalation Ladder
//!
//! ```text
//! NotStarted (counter 0)
//!     │  place step 1
//!     ▼
//! AwaitingAttempt(k) ── delay gate closed ──────────► wait (next tick)
//!     │                ── call still live ──────────► wait (next tick)
//!     │                ── transfer tool invoked ────► Terminal(accepted)
//!     │
//!     ├─ k < K  → place step k+1, counter k+1
//!     ├─ k == K → place final call (step K+1) ─────► Terminal(exhausted)
//!     │
//!     ▼
//! Overflow(k > K) ──────────────────────────────────► Terminal(overflow)
//!
//! On-call step without a contact ─────────────────► default contact, else next fixed rung
//! No dialable destination for a step ──────────────► Terminal(unreachable)
//! ```

pub mod engine;
pub mod gate;
pub mod ladder;
pub mod state;

pub use engine::{
    EngineConfig, Effect, EscalationAction, EscalationEngine, PlacementKind, SkipReason,
    WaitReason,
};
pub use gate::{can_attempt, DelayAnchor};
pub use ladder::{
    resolve_target, CallPurpose, CallTarget, Contact, KeywordRoute, Ladder, LadderError,
    MissingContactPolicy, Rung, RungTarget,
};
pub use state::EscalationState;

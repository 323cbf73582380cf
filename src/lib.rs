//! Elementary cellular automaton engine with pluggable compute backends.
//!
//! [`AnimationSequencer`] drives the animation: it owns the generation log,
//! asks a [`ComputeBackend`] for each new row, detects completion, cycles
//! rules and re-centers on resize. Rows are drawn by any [`Renderer`].

pub mod compute;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod render;
pub mod rules;
pub mod sequencer;
pub mod ticker;

pub use compute::{BackendPreference, ComputeBackend, CpuBackend, FallbackBackend};
pub use config::{Config, Variant};
pub use error::{BackendError, CaError, ConfigError};
pub use events::SequencerEvent;
pub use generation::{next_row, Row};
pub use render::{FrameView, RenderStyle, Renderer};
pub use rules::{RuleSet, RuleTable, NAMED_RULES};
pub use sequencer::{AdvanceOutcome, AnimationSequencer, Phase};
pub use ticker::Ticker;

//! vdm-pog - Proof obligation generator for VDM models
//!
//! Walks a type-checked [`vdm_core::ast::Module`] and emits the proof
//! obligations that must hold for the model to be consistent: preconditions
//! of partial operators and calls, subtype checks, state and type invariants,
//! loop termination and so on. Each obligation is rendered as VDM text under
//! the assumptions in force at its source position.
//!
//! Obligations that this pass cannot state soundly (inside loops that update
//! state, after non-deterministic or opaque calls, ...) are still emitted but
//! marked with an [`UncheckedReason`].
//!
//! # Example
//!
//! ```ignore
//! use vdm_pog::{generate, PogOptions};
//!
//! let module: vdm_core::Module = serde_json::from_str(&json)?;
//! let obligations = generate(&module, &PogOptions::default())?;
//! for po in &obligations {
//!     println!("{}", po.render(100));
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod generate;
pub mod obligation;
pub mod state;
pub mod walker;

pub use config::PogOptions;
pub use context::{ContextFrame, ContextStack};
pub use error::{PogError, PogResult};
pub use generate::{generate, generate_module, CancelToken};
pub use obligation::{ObligationKind, ObligationList, PoStatus, ProofObligation, UncheckedReason};
pub use state::PogState;
pub use walker::Walker;

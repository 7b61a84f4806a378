//! Module driver

use crate::config::PogOptions;
use crate::error::{PogError, PogResult};
use crate::obligation::ObligationList;
use crate::walker::Walker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use vdm_core::ast::Module;
use vdm_core::env::Environment;

/// Cooperative cancellation flag, checked between definitions
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Generate the proof obligations of `module`
pub fn generate(module: &Module, options: &PogOptions) -> PogResult<ObligationList> {
    generate_module(module, options, &CancelToken::new())
}

/// Generate the proof obligations of `module`, stopping early if `cancel` is set
///
/// Obligations are numbered `1..N` in traversal order: the state definition
/// first, then each definition in source order.
pub fn generate_module(
    module: &Module,
    options: &PogOptions,
    cancel: &CancelToken,
) -> PogResult<ObligationList> {
    let env = Environment::from_module(module)?;
    info!(
        module = %module.name,
        definitions = module.definitions.len(),
        "generating proof obligations"
    );

    let mut walker = Walker::new(&env, options);
    if let Some(state) = &module.state {
        walker.walk_state(state)?;
    }
    for def in &module.definitions {
        if cancel.is_cancelled() {
            debug!(module = %module.name, "generation cancelled");
            return Err(PogError::Cancelled);
        }
        walker.walk_definition(def)?;
    }

    let mut obligations = walker.finish();
    obligations.renumber();
    info!(module = %module.name, count = obligations.len(), "generated proof obligations");
    Ok(obligations)
}

//! Step registry: maps configured keys onto a closed set of step variants
use prep_core::{ModalitySection, StepConfig, StepMetadata};

/// A step variant addressable from configuration.
pub trait StepKind: Copy {
    fn config_key(self) -> &'static str;

    /// Flag steps (`drop_duplicates: true`) run only when switched on.
    fn is_flag(self) -> bool {
        false
    }
}

/// One entry of an execution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Planned<S> {
    Step(S, StepConfig),
    /// A configured key no variant claims. Runs as a no-op with a warning.
    Identity(String),
}

/// Known steps in `order`, then unrecognized keys in document order.
/// Configuration order never changes execution order.
pub fn plan<S: StepKind>(section: &ModalitySection, order: &[S]) -> Vec<Planned<S>> {
    let mut planned: Vec<Planned<S>> = order
        .iter()
        .filter_map(|kind| {
            let cfg = section.step(kind.config_key())?;
            if kind.is_flag() && !cfg.enabled() {
                return None;
            }
            Some(Planned::Step(*kind, cfg))
        })
        .collect();

    planned.extend(
        section
            .step_keys()
            .filter(|key| !order.iter().any(|kind| kind.config_key() == *key))
            .map(|key| Planned::Identity(key.to_string())),
    );
    planned
}

pub fn identity_metadata(requested: &str) -> StepMetadata {
    StepMetadata::new("identity")
        .with_fact("requested", requested)
        .with_warning(format!("unrecognized step '{}' ignored", requested))
}

//! Suspend sub-block abstraction.
//!
//! A [`Component`] is one independently-sequenced block of the suspend
//! path: it owns its poke tables and gets lifecycle callbacks around the
//! transition. Components hold no shared mutable state with each other;
//! ordering guarantees come from the orchestrator, not from the
//! components themselves.

/// How deep the transition goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Core idle only. Main memory and translation stay live; no image is
    /// assembled and no tables execute.
    Standby,
    /// Main memory in self-refresh, memory controller stopped. The engine
    /// must run from retained memory, so an image is assembled and copied.
    MemRetained,
}

impl PowerState {
    /// Does this level require relocating the engine into retained memory?
    pub const fn needs_image(&self) -> bool {
        matches!(self, PowerState::MemRetained)
    }
}

/// Snapshot of which external wake sources are relevant to this attempt.
///
/// One bit per Platform-defined source; the engine treats it as opaque and
/// just hands it to `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WakeSources(pub u32);

impl WakeSources {
    pub const NONE: Self = Self(0);

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Lifecycle failure reported by a component.
///
/// Carried unchanged through rollback and back to the caller, so it is a
/// comparable value, not a boxed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentError(pub &'static str);

/// One suspend sub-block: lifecycle hooks plus owned poke tables.
///
/// Call ordering contract (enforced by the orchestrator):
/// - `begin` in registration order; first failure rolls back with `end`
///   on everything that already succeeded, reverse order.
/// - `pre_enter` in registration order, same rollback rule.
/// - `post_enter` and `end` in reverse registration order, infallible.
///
/// Tables are encoded poke-table words **without** a trailing `End`; the
/// image assembler writes the group terminators.
pub trait Component {
    fn name(&self) -> &'static str;

    /// Entry hook. `wake` is the snapshot of relevant wake sources.
    fn begin(&mut self, state: PowerState, wake: &WakeSources) -> Result<(), ComponentError>;

    /// Last fallible hook before the transition is committed.
    fn pre_enter(&mut self, state: PowerState) -> Result<(), ComponentError> {
        let _ = state;
        Ok(())
    }

    /// Wake-side restore hook. Must not fail; the transition already
    /// happened and there is nothing to roll back to.
    fn post_enter(&mut self, state: PowerState) {
        let _ = state;
    }

    /// Final hook, also used as the rollback path for a failed `begin`
    /// or `pre_enter`.
    fn end(&mut self, state: PowerState);

    /// Encoded enter-table words, no trailing `End`.
    fn enter_table(&self) -> &[u32] {
        &[]
    }

    /// Encoded exit-table words, no trailing `End`. Optional.
    fn exit_table(&self) -> &[u32] {
        &[]
    }

    /// Walk this component's enter tables in execution order. Composed
    /// components (see [`crate::mcm::Mcm`]) override this to forward to
    /// their children.
    fn visit_enter_tables(&self, visit: &mut dyn FnMut(&[u32])) {
        visit(self.enter_table());
    }

    /// Walk exit tables in execution order (already reversed for composed
    /// components).
    fn visit_exit_tables(&self, visit: &mut dyn FnMut(&[u32])) {
        visit(self.exit_table());
    }
}

//! Capability-based context propagation.
//!
//! # Responsibility
//! - Hand a live context to screen-like consumers on navigation, without
//!   a global singleton.
//! - Keep the capability check one documented operation: a safe interface
//!   query on the target.
//!
//! # Invariants
//! - Injection is idempotent; setting the same session twice leaves the
//!   target unchanged.
//! - A target without the capability is a silent no-op (permissive
//!   policy): navigation chains legitimately contain screens that never
//!   need persistence access.

use crate::store::Context;
use log::debug;

/// Capability a screen declares to receive a propagated context.
///
/// The slot holds a handle to the shared session; injection clones the
/// handle, so identity is preserved across every holder.
pub trait ContextHolder {
    fn set_context(&mut self, context: Context);
    fn context(&self) -> Option<&Context>;

    /// Forwards this holder's context to the next screen on navigation.
    ///
    /// No-op when this holder has no context yet.
    fn forward_context(&self, target: &mut dyn Screen) {
        if let Some(context) = self.context() {
            inject(context, target);
        }
    }
}

/// Screen-like propagation target.
///
/// The two hooks default to `None`; a screen overrides
/// `as_context_holder` when it declares the capability, and a navigation
/// shell overrides `first_child` to expose the real first screen behind
/// it.
pub trait Screen {
    /// Safe capability query; the single point where "does this screen
    /// take a context" is decided.
    fn as_context_holder(&mut self) -> Option<&mut dyn ContextHolder> {
        None
    }

    /// First child of a composite screen, when there is one.
    fn first_child(&mut self) -> Option<&mut dyn Screen> {
        None
    }
}

/// Injects `context` into `target`.
///
/// When the immediate target lacks the capability, injection is attempted
/// one level down on the composite's first child. Anything else is a
/// silent no-op. Side effect only; never fails.
pub fn inject(context: &Context, target: &mut dyn Screen) {
    if let Some(holder) = target.as_context_holder() {
        holder.set_context(context.clone());
        debug!(
            "event=context_inject module=propagate status=ok target=direct session={}",
            context.session_id()
        );
        return;
    }

    if let Some(child) = target.first_child() {
        if let Some(holder) = child.as_context_holder() {
            holder.set_context(context.clone());
            debug!(
                "event=context_inject module=propagate status=ok target=first_child session={}",
                context.session_id()
            );
            return;
        }
    }

    debug!(
        "event=context_inject module=propagate status=noop reason=capability_missing session={}",
        context.session_id()
    );
}

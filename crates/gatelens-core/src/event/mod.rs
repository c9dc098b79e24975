//! Change notification for netlist mutations.
//!
//! [`CallbackHook`] is the generic primitive; [`EventHandlers`] bundles one
//! hook per subject (gates, nets, modules, the netlist itself). A netlist
//! holds its handlers behind an `Arc`, so callbacks can capture a clone and
//! register or remove callbacks while an event is being delivered.

mod hook;
mod kinds;

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

pub use hook::{guarded, CallbackError, CallbackFailure, CallbackHook, CallbackResult};
pub use kinds::{GateEvent, ModuleEvent, NetEvent, NetlistEvent};

/// Failures kept by [`EventHandlers`] before the oldest ones are dropped.
const MAX_RECORDED_FAILURES: usize = 256;

/// The four event hooks of one netlist.
#[derive(Debug)]
pub struct EventHandlers {
    pub gate: CallbackHook<GateEvent>,
    pub net: CallbackHook<NetEvent>,
    pub module: CallbackHook<ModuleEvent>,
    pub netlist: CallbackHook<NetlistEvent>,
    enabled: AtomicBool,
    failures: Mutex<Vec<CallbackFailure>>,
}

impl EventHandlers {
    /// Create handlers with no callbacks and dispatch enabled.
    pub fn new() -> Self {
        Self {
            gate: CallbackHook::new("gate"),
            net: CallbackHook::new("net"),
            module: CallbackHook::new("module"),
            netlist: CallbackHook::new("netlist"),
            enabled: AtomicBool::new(true),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Enable or disable delivery of all events.
    ///
    /// Events raised while disabled are dropped, not queued.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether events are currently delivered.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Drain the callback failures recorded since the last call.
    pub fn take_failures(&self) -> Vec<CallbackFailure> {
        std::mem::take(&mut *self.failures.lock())
    }

    pub(crate) fn emit_gate(&self, event: GateEvent) {
        if self.is_enabled() {
            self.record(self.gate.call(&event));
        }
    }

    pub(crate) fn emit_net(&self, event: NetEvent) {
        if self.is_enabled() {
            self.record(self.net.call(&event));
        }
    }

    pub(crate) fn emit_module(&self, event: ModuleEvent) {
        if self.is_enabled() {
            self.record(self.module.call(&event));
        }
    }

    pub(crate) fn emit_netlist(&self, event: NetlistEvent) {
        if self.is_enabled() {
            self.record(self.netlist.call(&event));
        }
    }

    fn record(&self, failures: Vec<CallbackFailure>) {
        if failures.is_empty() {
            return;
        }
        let mut recorded = self.failures.lock();
        recorded.extend(failures);
        let overflow = recorded.len().saturating_sub(MAX_RECORDED_FAILURES);
        if overflow > 0 {
            recorded.drain(..overflow);
        }
    }
}

impl Default for EventHandlers {
    fn default() -> Self {
        Self::new()
    }
}

//! Ambient execution tracing (`spec.md` §9 ambient stack).
//!
//! Grounded on `ouros::tracer::VmTracer`: a trait of default-no-op hooks so
//! `NoopTracer` costs nothing, with `StderrTracer`/`RecordingTracer` for
//! debugging and tests. There is no bytecode instruction hook here (no VM),
//! only call/return and the host-effect boundary (`stderr`, locator I/O).

use std::fmt;

/// Trace hooks fired at key evaluator events. All methods default to no-ops.
///
/// `as_any` exists solely so `with-log` can swap in a `RecordingTracer`,
/// run a body, then downcast it back to read the captured events — there's
/// no other reason to inspect a tracer's concrete type.
pub trait Tracer: fmt::Debug + 'static {
    fn on_call(&mut self, _name: &str) {}
    fn on_return(&mut self, _name: &str) {}
    /// Fired for the `with-log`/`stderr` effect-publishing primitives
    /// (`spec.md` §7).
    fn on_effect(&mut self, _channel: &str, _message: &str) {}

    fn as_any(&self) -> &dyn std::any::Any;
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Writes each hook to stderr as it fires; intended for interactive
/// debugging, not production use.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_call(&mut self, name: &str) {
        eprintln!("[call] {name}");
    }

    fn on_return(&mut self, name: &str) {
        eprintln!("[return] {name}");
    }

    fn on_effect(&mut self, channel: &str, message: &str) {
        eprintln!("[{channel}] {message}");
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Clone)]
pub enum TraceEvent {
    Call(String),
    Return(String),
    Effect { channel: String, message: String },
}

/// Records every hook firing, for deterministic post-mortem inspection in
/// tests.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl Tracer for RecordingTracer {
    fn on_call(&mut self, name: &str) {
        self.events.push(TraceEvent::Call(name.to_owned()));
    }

    fn on_return(&mut self, name: &str) {
        self.events.push(TraceEvent::Return(name.to_owned()));
    }

    fn on_effect(&mut self, channel: &str, message: &str) {
        self.events.push(TraceEvent::Effect {
            channel: channel.to_owned(),
            message: message.to_owned(),
        });
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_captures_call_and_effect_events() {
        let mut tracer = RecordingTracer::default();
        tracer.on_call("greet");
        tracer.on_effect("stderr", "boom");
        assert_eq!(tracer.events.len(), 2);
    }
}

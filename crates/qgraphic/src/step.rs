//! Stepping (debugger) execution hooks.
//!
//! The interpreter is parameterized over a [`StepTracer`]; the hooks have
//! default no-op bodies, so eager execution with [`NoopStepTracer`]
//! monomorphizes to zero overhead. A stepping driver (the editor's debugger
//! or live preview) implements the trait to receive:
//!
//! - [`StepInfo`] *before* each simple statement executes, once before an
//!   `If` condition, once per `While` iteration before its condition, and
//!   once per `For` iteration after the iterable is evaluated but before
//!   the loop variable is bound. Statements inside called functions emit
//!   in source-depth-first order, interleaved with their callers.
//! - the most-recently-mutated frame *after* each simple statement that
//!   touched one; statements that mutate nothing produce no frame call.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopStepTracer`] | Zero-cost no-op (eager execution) |
//! | [`StderrStepTracer`] | Human-readable step log to stderr |
//! | [`RecordingStepTracer`] | Records steps and frame snapshots for tests and replay |
//!
//! Returning [`StepControl::Stop`] from `on_step` abandons the run: the
//! interpreter unwinds without executing the statement, mutations already
//! performed persist, and the run entry point reports
//! [`StepOutcome::Stopped`]. No locks or file handles are held between
//! steps, so stopping is always safe.

use crate::{expressions::Stmt, frame::Frame};

/// Emitted before a statement executes: the statement's source line and a
/// handle to the statement itself.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo<'a> {
    pub line: u32,
    pub stmt: &'a Stmt,
}

/// A tracer's verdict on whether execution proceeds past a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepControl {
    #[default]
    Continue,
    /// Abandon the run before executing the announced statement.
    Stop,
}

/// How a traced run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The program ran to completion.
    Finished,
    /// A tracer answered [`StepControl::Stop`].
    Stopped,
}

/// Hook points for stepping execution.
///
/// Both methods have default no-op implementations, so implementations
/// only override the hooks they care about.
pub trait StepTracer {
    /// Called before a statement executes. The default continues.
    fn on_step(&mut self, _info: StepInfo<'_>) -> StepControl {
        StepControl::Continue
    }

    /// Called after a simple statement that mutated a frame, with the most
    /// recently mutated frame.
    fn on_frame(&mut self, _frame: &Frame) {}
}

/// A tracer that does nothing; eager execution uses this.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStepTracer;

impl StepTracer for NoopStepTracer {}

/// Tracer that logs each step to stderr, one line per statement:
///
/// ```text
/// line    3: pixel-assign
/// line    4: Publish
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrStepTracer;

impl StepTracer for StderrStepTracer {
    fn on_step(&mut self, info: StepInfo<'_>) -> StepControl {
        eprintln!("line {:>4}: {}", info.line, info.stmt.kind_name());
        StepControl::Continue
    }
}

/// Tracer that records every step and every post-statement frame snapshot.
#[derive(Debug, Default)]
pub struct RecordingStepTracer {
    steps: Vec<(u32, &'static str)>,
    frames: Vec<Frame>,
}

impl RecordingStepTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(line, statement kind)` pairs in emission order.
    #[must_use]
    pub fn steps(&self) -> &[(u32, &'static str)] {
        &self.steps
    }

    /// Just the recorded lines, in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<u32> {
        self.steps.iter().map(|(line, _)| *line).collect()
    }

    /// Frame snapshots delivered after mutating statements.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl StepTracer for RecordingStepTracer {
    fn on_step(&mut self, info: StepInfo<'_>) -> StepControl {
        self.steps.push((info.line, info.stmt.kind_name()));
        StepControl::Continue
    }

    fn on_frame(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }
}

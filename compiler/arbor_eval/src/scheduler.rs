//! Host-level manager for scripts started with `StartScript`.
//!
//! The scheduler only stores scripts; the ticking lives on
//! [`Interpreter`](crate::Interpreter), which the scripts need mutably.

use crate::interpreter::ScriptNode;

#[derive(Default)]
pub(crate) struct Scheduler {
    scripts: Vec<ScriptNode>,
    started: usize,
    finished: usize,
}

impl Scheduler {
    pub(crate) fn add(&mut self, script: ScriptNode) {
        self.started += 1;
        self.scripts.push(script);
    }

    /// Take every script out for ticking. Scripts added meanwhile land in
    /// the emptied list.
    pub(crate) fn take(&mut self) -> Vec<ScriptNode> {
        std::mem::take(&mut self.scripts)
    }

    /// Put ticked scripts back ahead of any started during the tick.
    pub(crate) fn restore(&mut self, mut scripts: Vec<ScriptNode>) {
        scripts.append(&mut self.scripts);
        self.scripts = scripts;
    }

    pub(crate) fn record_finished(&mut self) {
        self.finished += 1;
        tracing::debug!(
            started = self.started,
            finished = self.finished,
            "scheduler progress"
        );
    }

    pub(crate) fn len(&self) -> usize {
        self.scripts.len()
    }
}

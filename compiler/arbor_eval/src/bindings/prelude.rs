//! Built-in natives available to every script.

use super::{Bindings, NativeNode};
use crate::interpreter::ScriptNode;
use crate::node::Status;
use crate::{EvalError, EvalResult, Interpreter};

pub(super) fn register(bindings: &mut Bindings) {
    let msg = bindings.arg("msg", "string");
    bindings.define_simple("trace", vec![msg], 0, trace);

    bindings.define_simple("SUCCESS", Vec::new(), 0, |_| Ok(Status::Success));
    bindings.define_simple("FAILURE", Vec::new(), 0, |_| Ok(Status::Failure));
    bindings.define_simple("RUNNING", Vec::new(), 0, |_| Ok(Status::Running));
    bindings.define_node("YIELD", Vec::new(), 0, Yield::default);

    let args = vec![bindings.arg("ticks", "int"), bindings.arg("is_success", "bool")];
    bindings.define_node("WaitTicks", args, 0, WaitTicks::default);

    let args = vec![
        bindings.arg("script", "func void()"),
        bindings.arg("num", "int"),
        bindings.arg("now", "bool"),
    ];
    bindings.define_simple("StartScript", args, 0, start_script);

    let script = bindings.arg("script", "func void()");
    bindings.define_node("RunScript", vec![script], 0, RunScript::default);
}

/// Write a string to the output handler, without a newline.
fn trace(interp: &mut Interpreter) -> EvalResult<Status> {
    let msg = interp.pop_value()?;
    interp.output().write(&msg.to_string());
    interp.release(&msg)?;
    Ok(Status::Success)
}

/// Spawn `num` independent copies of a closure on the scheduler.
fn start_script(interp: &mut Interpreter) -> EvalResult<Status> {
    let now = interp.pop_bool()?;
    let num = interp.pop_num()?;
    let script = interp.pop_value()?;
    let Some(closure) = script.as_func() else {
        interp.release(&script)?;
        return Err(EvalError::TypeMismatch {
            expected: "function",
            found: script.type_name(),
        });
    };
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "script counts are small non-negative integers"
    )]
    let num = num.max(0.0) as usize;
    for _ in 0..num {
        interp.start_script(closure, now)?;
    }
    interp.release(&script)?;
    Ok(Status::Success)
}

/// Running for exactly one tick.
#[derive(Default)]
struct Yield {
    first: bool,
}

impl NativeNode for Yield {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.first = true;
        Ok(())
    }

    fn execute(&mut self, _interp: &mut Interpreter) -> EvalResult<Status> {
        if std::mem::take(&mut self.first) {
            Ok(Status::Running)
        } else {
            Ok(Status::Success)
        }
    }
}

/// Running while the countdown lasts, then the requested result.
#[derive(Default)]
struct WaitTicks {
    ticks: i64,
    result: Option<Status>,
}

impl NativeNode for WaitTicks {
    fn init(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        let is_success = interp.pop_bool()?;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "tick counts are small integers"
        )]
        let ticks = interp.pop_num()? as i64;
        self.ticks = ticks;
        self.result = Some(if is_success {
            Status::Success
        } else {
            Status::Failure
        });
        Ok(())
    }

    fn execute(&mut self, _interp: &mut Interpreter) -> EvalResult<Status> {
        self.ticks -= 1;
        if self.ticks > 0 {
            return Ok(Status::Running);
        }
        Ok(self.result.unwrap_or(Status::Success))
    }
}

/// Run a closure as a child behavior of the calling node.
#[derive(Default)]
struct RunScript {
    script: Option<ScriptNode>,
}

impl NativeNode for RunScript {
    fn init(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        let value = interp.pop_value()?;
        let script = match value.as_func() {
            Some(closure) => interp.script_node(closure),
            None => Err(EvalError::TypeMismatch {
                expected: "function",
                found: value.type_name(),
            }),
        };
        interp.release(&value)?;
        self.script = Some(script?);
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Status> {
        match &mut self.script {
            Some(script) => script.run(interp),
            None => Ok(Status::Success),
        }
    }

    fn stop(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match &mut self.script {
            Some(script) => script.stop(interp),
            None => Ok(()),
        }
    }

    fn deinit(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match self.script.take() {
            Some(script) => script.release(interp),
            None => Ok(()),
        }
    }
}

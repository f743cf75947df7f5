//! End-to-end tests: resolved programs built by hand, ticked through the
//! public driver API.

mod closure_tests;
mod data_tests;

use std::sync::Once;

use arbor_ir::{Arg, Block, BinaryOp, BlockKind, Expr, FuncId, ProgramBuilder, SharedInterner, Slot};
use pretty_assertions::assert_eq;

use crate::output::buffer_output;
use crate::{Bindings, Interpreter, InterpreterBuilder, Status};

static TRACING_INIT: Once = Once::new();

/// Engine logs for test runs. Enable with `RUST_LOG=arbor_eval=trace`.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer().with_target(true))
                .with(EnvFilter::from_default_env())
                .try_init();
        }
    });
}

/// A program under construction plus the prelude bindings it resolves
/// against.
pub(crate) struct Fixture {
    pub(crate) program: ProgramBuilder,
    pub(crate) bindings: Bindings,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let interner = SharedInterner::new();
        Fixture {
            program: ProgramBuilder::new(interner.clone()),
            bindings: Bindings::with_prelude(interner),
        }
    }

    /// Call a native by name with value arguments.
    pub(crate) fn native(&self, name: &str, args: Vec<Expr>) -> Expr {
        let native = self.bindings.find_func(name).unwrap();
        Expr::native(native, args.into_iter().map(Arg::Value).collect())
    }

    pub(crate) fn trace(&self, text: &str) -> Expr {
        self.native("trace", vec![Expr::str(text)])
    }

    pub(crate) fn trace_value(&self, value: Expr) -> Expr {
        self.native("trace", vec![value])
    }

    pub(crate) fn build(self) -> Interpreter {
        self.build_with(|builder| builder)
    }

    pub(crate) fn build_with(
        self,
        configure: impl FnOnce(InterpreterBuilder) -> InterpreterBuilder,
    ) -> Interpreter {
        init_tracing();
        let builder = InterpreterBuilder::new(self.program.finish(), self.bindings)
            .output(buffer_output());
        configure(builder).build().unwrap()
    }
}

pub(crate) fn slot(index: u16) -> Slot {
    Slot::new(index)
}

pub(crate) fn seq(stmts: Vec<Expr>) -> Block {
    Block::seq(stmts)
}

pub(crate) fn block(kind: BlockKind, stmts: Vec<Expr>) -> Expr {
    Expr::block(kind, stmts)
}

pub(crate) fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs)
}

pub(crate) fn call(func: FuncId) -> Expr {
    Expr::call(func, Vec::new())
}

/// Tick `name` until it stops running, at most `limit` times.
pub(crate) fn run_to_end(interp: &mut Interpreter, name: &str, limit: usize) -> Status {
    let mut node = interp.func_node(name).unwrap();
    let mut status = Status::Running;
    for _ in 0..limit {
        status = node.run(interp).unwrap();
        if status.is_terminal() {
            break;
        }
    }
    node.release(interp).unwrap();
    status
}

pub(crate) fn output(interp: &Interpreter) -> String {
    interp.output().contents()
}

/// Nothing left behind: operand stack, call stack, heap, frames and
/// function bodies are all back to idle.
pub(crate) fn assert_idle(interp: &Interpreter) {
    assert_eq!(interp.stack_count(), 0);
    assert_eq!(interp.call_depth(), 0);
    assert!(
        interp.heap_stats().is_balanced(),
        "heap not balanced: {:?}",
        interp.heap_stats()
    );
    assert!(interp.frame_stats().is_balanced());
    assert_eq!(interp.node_pool_count(), interp.node_pool_count_free());
}

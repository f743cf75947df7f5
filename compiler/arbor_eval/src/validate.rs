//! Load-time checks of a resolved program against its bindings.
//!
//! The frontend's type checker guarantees most of what the engine relies on;
//! this pass re-checks the structural facts whose violation would otherwise
//! surface mid-tick as an invariant error: slot ranges, call shapes, lambda
//! parentage and loop control placement.

use arbor_ir::{
    Arg, Block, BlockKind, Call, CallTarget, CastKind, ClassId, ConfigLiteral, Expr, FieldIdx,
    FuncDecl, FuncId, FuncKind, Program, Slot, Span,
};

use crate::bindings::{Bindings, FieldAccess};
use crate::{ScriptError, ScriptErrorKind};

/// Check every declaration of `program`. Stops at the first error.
pub fn validate(program: &Program, bindings: &Bindings) -> Result<(), ScriptError> {
    for (func, decl) in program.funcs() {
        let mut checker = Checker {
            program,
            bindings,
            func,
            locals: decl.locals,
            returns: decl.returns,
            loops: 0,
            span: decl.span,
        };
        checker
            .decl(decl)
            .map_err(|kind| checker.error(kind))?;
    }
    Ok(())
}

type Check = Result<(), ScriptErrorKind>;

struct Checker<'a> {
    program: &'a Program,
    bindings: &'a Bindings,
    func: FuncId,
    locals: u16,
    returns: u8,
    /// Enclosing `while`/`forever` bodies.
    loops: usize,
    /// Innermost located construct, for the report.
    span: Span,
}

/// Parameter shape shared by script functions and native bindings.
struct ParamShape {
    is_ref: bool,
    has_default: bool,
}

impl Checker<'_> {
    fn error(&self, kind: ScriptErrorKind) -> ScriptError {
        ScriptError {
            kind,
            func: self.program.func_name(self.func).to_owned(),
            span: self.span,
        }
    }

    fn slot(&self, slot: Slot) -> Check {
        if slot.index() < usize::from(self.locals) {
            Ok(())
        } else {
            Err(ScriptErrorKind::SlotOutOfRange {
                slot,
                locals: self.locals,
            })
        }
    }

    fn decl(&mut self, decl: &FuncDecl) -> Check {
        for param in &decl.params {
            self.slot(param.slot)?;
            if let Some(default) = &param.default {
                self.default_expr(default)?;
            }
        }
        match decl.kind {
            FuncKind::Func => {
                if !decl.upvalues.is_empty() {
                    return Err(ScriptErrorKind::NotALambda(self.func));
                }
            }
            FuncKind::Lambda { parent } => {
                let outer = self
                    .program
                    .func(parent)
                    .ok_or(ScriptErrorKind::UnresolvedFunc(parent))?;
                for up in &decl.upvalues {
                    if up.src.index() >= usize::from(outer.locals) {
                        return Err(ScriptErrorKind::SlotOutOfRange {
                            slot: up.src,
                            locals: outer.locals,
                        });
                    }
                    self.slot(up.dst)?;
                }
            }
        }
        self.block(&decl.body)
    }

    /// Defaults run in the caller's frame, so they may not name slots.
    fn default_expr(&mut self, expr: &Expr) -> Check {
        let locals = std::mem::replace(&mut self.locals, 0);
        let result = self.expr(expr);
        self.locals = locals;
        result
    }

    fn block(&mut self, block: &Block) -> Check {
        if !block.span.is_dummy() {
            self.span = block.span;
        }
        let looping = block.kind == BlockKind::Forever;
        if looping {
            self.loops += 1;
        }
        let result = block.stmts.iter().try_for_each(|stmt| self.expr(stmt));
        if looping {
            self.loops -= 1;
        }
        result
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Check {
        exprs.iter().try_for_each(|e| self.expr(e))
    }

    fn expr(&mut self, expr: &Expr) -> Check {
        match expr {
            Expr::Literal(_) | Expr::FuncRef(_) => Ok(()),
            Expr::Var(slot) => self.slot(*slot),
            Expr::DeclVar { slot, init } => {
                self.slot(*slot)?;
                init.as_deref().map_or(Ok(()), |init| self.expr(init))
            }
            Expr::Assign { slot, value } => {
                self.slot(*slot)?;
                self.expr(value)
            }
            Expr::Destructure { targets, value } => {
                for target in targets {
                    self.slot(target.slot)?;
                }
                self.expr(value)
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Cast { to, operand } => {
                if let CastKind::Class(class) = to {
                    self.class(*class)?;
                }
                self.expr(operand)
            }
            Expr::Call(call) => self.call(call),
            Expr::Lambda(lambda) => self.lambda(*lambda),
            Expr::Return(values) => {
                self.exprs(values)?;
                let got = values.iter().map(|v| self.yields(v)).sum();
                if got == usize::from(self.returns) {
                    Ok(())
                } else {
                    Err(ScriptErrorKind::ReturnCount {
                        expected: self.returns,
                        got,
                    })
                }
            }
            Expr::Break => self.loop_control("break"),
            Expr::Continue => self.loop_control("continue"),
            Expr::If { arms, otherwise } => {
                for arm in arms {
                    self.expr(&arm.cond)?;
                    self.block(&arm.body)?;
                }
                otherwise.as_ref().map_or(Ok(()), |b| self.block(b))
            }
            Expr::While { cond, body } => {
                self.expr(cond)?;
                self.loops += 1;
                let result = self.block(body);
                self.loops -= 1;
                result
            }
            Expr::Block(block) => self.block(block),
            Expr::Discard { value, .. } => self.expr(value),
            Expr::Array(items) => self.exprs(items),
            Expr::ArrayOp { op, args } => {
                if args.len() != op.arity() {
                    return Err(ScriptErrorKind::ArgCount {
                        callee: format!("{op:?}"),
                        expected: op.arity(),
                        got: args.len(),
                    });
                }
                self.exprs(args)
            }
            Expr::New { class, fields } => {
                for (field, value) in fields {
                    self.field(*class, *field)?;
                    self.expr(value)?;
                }
                self.class(*class)
            }
            Expr::GetField {
                object,
                class,
                field,
            } => {
                self.field(*class, *field)?;
                self.expr(object)
            }
            Expr::SetField {
                object,
                class,
                field,
                value,
            } => {
                self.field(*class, *field)?;
                self.expr(object)?;
                self.expr(value)
            }
        }
    }

    fn loop_control(&self, keyword: &'static str) -> Check {
        if self.loops == 0 {
            Err(ScriptErrorKind::LoopControl(keyword))
        } else {
            Ok(())
        }
    }

    fn lambda(&self, lambda: FuncId) -> Check {
        let decl = self
            .program
            .func(lambda)
            .ok_or(ScriptErrorKind::UnresolvedFunc(lambda))?;
        match decl.kind {
            FuncKind::Lambda { parent } if parent == self.func => Ok(()),
            FuncKind::Lambda { .. } => Err(ScriptErrorKind::LambdaParent(lambda)),
            FuncKind::Func => Err(ScriptErrorKind::NotALambda(lambda)),
        }
    }

    fn class(&self, class: ClassId) -> Check {
        self.bindings
            .class(class)
            .map(|_| ())
            .ok_or(ScriptErrorKind::UnresolvedClass(class))
    }

    fn field(&self, class: ClassId, field: FieldIdx) -> Result<FieldAccess, ScriptErrorKind> {
        let binding = self
            .bindings
            .class(class)
            .ok_or(ScriptErrorKind::UnresolvedClass(class))?;
        binding
            .field(field)
            .map(|f| f.access)
            .ok_or(ScriptErrorKind::UnresolvedField { class, field })
    }

    /// Values an expression leaves on the stack. Calls through a function
    /// value are assumed to yield one.
    fn yields(&self, expr: &Expr) -> usize {
        match expr {
            Expr::Literal(_)
            | Expr::Var(_)
            | Expr::Binary { .. }
            | Expr::Logical { .. }
            | Expr::Unary { .. }
            | Expr::Cast { .. }
            | Expr::Lambda(_)
            | Expr::FuncRef(_)
            | Expr::Array(_)
            | Expr::New { .. }
            | Expr::GetField { .. } => 1,
            Expr::ArrayOp { op, .. } => op.results(),
            Expr::Block(block) if block.kind == BlockKind::Eval => 1,
            Expr::Call(call) => match &call.target {
                CallTarget::Func(func) => self
                    .program
                    .func(*func)
                    .map_or(0, |decl| usize::from(decl.returns)),
                CallTarget::Native(native) => self
                    .bindings
                    .func(*native)
                    .map_or(0, |binding| usize::from(binding.returns)),
                CallTarget::Value(_) => 1,
            },
            _ => 0,
        }
    }

    fn call(&mut self, call: &Call) -> Check {
        if !call.span.is_dummy() {
            self.span = call.span;
        }
        let (callee, params): (&str, Option<Vec<ParamShape>>) = match &call.target {
            CallTarget::Func(func) => {
                let decl = self
                    .program
                    .func(*func)
                    .ok_or(ScriptErrorKind::UnresolvedFunc(*func))?;
                if call.config.is_some() {
                    return Err(ScriptErrorKind::ConfigUnexpected(
                        self.program.func_name(*func).to_owned(),
                    ));
                }
                let shape = decl
                    .params
                    .iter()
                    .map(|p| ParamShape {
                        is_ref: p.is_ref,
                        has_default: p.default.is_some(),
                    })
                    .collect();
                (self.program.func_name(*func), Some(shape))
            }
            CallTarget::Native(native) => {
                let binding = self
                    .bindings
                    .func(*native)
                    .ok_or(ScriptErrorKind::UnresolvedNative(*native))?;
                let name = self.bindings.func_name(*native);
                match (&call.config, binding.is_config()) {
                    (None, true) => return Err(ScriptErrorKind::ConfigMissing(name.to_owned())),
                    (Some(_), false) => {
                        return Err(ScriptErrorKind::ConfigUnexpected(name.to_owned()))
                    }
                    (Some(literal), true) => self.config(literal)?,
                    (None, false) => {}
                }
                let shape = binding
                    .args
                    .iter()
                    .map(|a| ParamShape {
                        is_ref: a.is_ref,
                        has_default: a.default.is_some(),
                    })
                    .collect();
                (name, Some(shape))
            }
            CallTarget::Value(callee) => {
                if call.config.is_some() {
                    return Err(ScriptErrorKind::ConfigUnexpected(
                        "<function value>".to_owned(),
                    ));
                }
                self.expr(callee)?;
                ("<function value>", None)
            }
        };

        if let Some(params) = &params {
            if params.len() != call.args.len() {
                return Err(ScriptErrorKind::ArgCount {
                    callee: callee.to_owned(),
                    expected: params.len(),
                    got: call.args.len(),
                });
            }
        }

        for (index, arg) in call.args.iter().enumerate() {
            let param = params.as_ref().and_then(|p| p.get(index));
            match arg {
                Arg::Value(expr) => {
                    if param.is_some_and(|p| p.is_ref) {
                        return Err(ScriptErrorKind::RefRequired {
                            callee: callee.to_owned(),
                            index,
                        });
                    }
                    self.expr(expr)?;
                }
                Arg::Ref(slot) => {
                    if param.is_some_and(|p| !p.is_ref) {
                        return Err(ScriptErrorKind::RefNotAllowed {
                            callee: callee.to_owned(),
                            index,
                        });
                    }
                    self.slot(*slot)?;
                }
                Arg::FieldRef {
                    object,
                    class,
                    field,
                } => {
                    if param.is_some_and(|p| !p.is_ref) {
                        return Err(ScriptErrorKind::RefNotAllowed {
                            callee: callee.to_owned(),
                            index,
                        });
                    }
                    if let FieldAccess::Computed { .. } = self.field(*class, *field)? {
                        return Err(ScriptErrorKind::FieldNotRef {
                            class: *class,
                            field: *field,
                        });
                    }
                    self.expr(object)?;
                }
                Arg::Default => {
                    if !param.is_some_and(|p| p.has_default) {
                        return Err(ScriptErrorKind::MissingDefault {
                            callee: callee.to_owned(),
                            index,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn config(&mut self, literal: &ConfigLiteral) -> Check {
        match literal {
            ConfigLiteral::Leaf(expr) => self.expr(expr),
            ConfigLiteral::Object(fields) => fields.iter().try_for_each(|(_, v)| self.config(v)),
            ConfigLiteral::Array(items) => items.iter().try_for_each(|v| self.config(v)),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

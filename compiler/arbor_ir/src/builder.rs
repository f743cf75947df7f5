//! Program assembly.
//!
//! Mirrors what the frontend does after type checking: functions are
//! declared first so bodies can reference each other (including
//! recursively), then bodies are attached.

use crate::{
    Block, FuncDecl, FuncId, FuncKind, ModuleId, Name, Param, Program, SharedInterner, Span,
    Upvalue,
};
use rustc_hash::FxHashMap;

/// Shape of a function: parameters, slot count and return count.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub locals: u16,
    pub returns: u8,
}

impl Signature {
    pub fn new(locals: u16) -> Self {
        Signature {
            params: Vec::new(),
            locals,
            returns: 0,
        }
    }

    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn returns(mut self, count: u8) -> Self {
        self.returns = count;
        self
    }
}

pub struct ProgramBuilder {
    interner: SharedInterner,
    module: ModuleId,
    funcs: Vec<FuncDecl>,
    index: FxHashMap<(ModuleId, Name), FuncId>,
}

impl ProgramBuilder {
    pub fn new(interner: SharedInterner) -> Self {
        ProgramBuilder {
            interner,
            module: ModuleId::MAIN,
            funcs: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Module that subsequent declarations belong to.
    pub fn set_module(&mut self, module: ModuleId) -> &mut Self {
        self.module = module;
        self
    }

    pub fn name(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    fn push(&mut self, decl: FuncDecl) -> FuncId {
        let raw = u32::try_from(self.funcs.len())
            .unwrap_or_else(|_| panic!("program exceeded {} functions", u32::MAX));
        self.funcs.push(decl);
        FuncId::new(raw)
    }

    /// Declare a named function with an empty body.
    pub fn declare(&mut self, name: &str, sig: Signature) -> FuncId {
        let name = self.interner.intern(name);
        let id = self.push(FuncDecl {
            name,
            module: self.module,
            kind: FuncKind::Func,
            params: sig.params,
            upvalues: Vec::new(),
            locals: sig.locals,
            returns: sig.returns,
            body: Block::seq(Vec::new()),
            span: Span::DUMMY,
        });
        self.index.insert((self.module, name), id);
        id
    }

    /// Declare a lambda defined inside `parent`.
    pub fn declare_lambda(&mut self, parent: FuncId, sig: Signature, upvalues: Vec<Upvalue>) -> FuncId {
        self.push(FuncDecl {
            name: Name::EMPTY,
            module: self.module,
            kind: FuncKind::Lambda { parent },
            params: sig.params,
            upvalues,
            locals: sig.locals,
            returns: sig.returns,
            body: Block::seq(Vec::new()),
            span: Span::DUMMY,
        })
    }

    /// Attach a body. Unknown ids are ignored; validation reports them later.
    pub fn define(&mut self, func: FuncId, body: Block) -> &mut Self {
        if let Some(decl) = self.funcs.get_mut(func.index()) {
            decl.span = body.span;
            decl.body = body;
        }
        self
    }

    /// Declare and define in one step.
    pub fn func(&mut self, name: &str, sig: Signature, body: Block) -> FuncId {
        let id = self.declare(name, sig);
        self.define(id, body);
        id
    }

    /// Declare and define a lambda in one step.
    pub fn lambda(
        &mut self,
        parent: FuncId,
        sig: Signature,
        upvalues: Vec<Upvalue>,
        body: Block,
    ) -> FuncId {
        let id = self.declare_lambda(parent, sig, upvalues);
        self.define(id, body);
        id
    }

    pub fn finish(self) -> Program {
        Program::new(self.interner, self.funcs, self.index)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

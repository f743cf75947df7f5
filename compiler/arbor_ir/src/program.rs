//! A fully resolved program.

use crate::{FuncDecl, FuncId, ModuleId, Name, SharedInterner};
use rustc_hash::FxHashMap;

/// Every function and lambda declaration, indexed by [`FuncId`].
///
/// Lambdas are declarations like any other; they are not reachable through
/// the name index.
pub struct Program {
    interner: SharedInterner,
    funcs: Vec<FuncDecl>,
    index: FxHashMap<(ModuleId, Name), FuncId>,
}

impl Program {
    pub(crate) fn new(
        interner: SharedInterner,
        funcs: Vec<FuncDecl>,
        index: FxHashMap<(ModuleId, Name), FuncId>,
    ) -> Self {
        Program {
            interner,
            funcs,
            index,
        }
    }

    #[inline]
    pub fn func(&self, id: FuncId) -> Option<&FuncDecl> {
        self.funcs.get(id.index())
    }

    /// Find a named function in a module.
    pub fn lookup(&self, module: ModuleId, name: Name) -> Option<FuncId> {
        self.index.get(&(module, name)).copied()
    }

    /// Find a named function by text in any module, lowest module first.
    pub fn lookup_str(&self, name: &str) -> Option<FuncId> {
        let name = self.interner.get(name)?;
        self.index
            .iter()
            .filter(|((_, n), _)| *n == name)
            .min_by_key(|((module, _), _)| *module)
            .map(|(_, id)| *id)
    }

    /// Iterate declarations with their ids.
    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &FuncDecl)> {
        self.funcs.iter().enumerate().map(|(i, decl)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "ids were allocated as u32 by the builder"
            )]
            let id = FuncId::new(i as u32);
            (id, decl)
        })
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Text of a function's name, for diagnostics.
    pub fn func_name(&self, id: FuncId) -> &'static str {
        self.func(id).map_or("<unknown>", |decl| {
            if decl.is_lambda() {
                "<lambda>"
            } else {
                self.interner.lookup(decl.name)
            }
        })
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("funcs", &self.funcs.len())
            .finish_non_exhaustive()
    }
}

//! Numeric identities produced by name resolution.
//!
//! All ids are plain indices. The engine never looks names up at run time;
//! it indexes into the program or the binding registry with these.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty) => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name($repr);

        impl $name {
            /// Create from a raw index.
            #[inline]
            pub const fn new(raw: $repr) -> Self {
                $name(raw)
            }

            /// Get the raw value.
            #[inline]
            pub const fn raw(self) -> $repr {
                self.0
            }

            /// Get the value as a `usize` index.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_id! {
    /// A user-declared function or lambda.
    FuncId(u32) => "fn#"
}

define_id! {
    /// A function registered through the native binding surface.
    NativeId(u32) => "native#"
}

define_id! {
    /// A class registered through the native binding surface.
    ClassId(u32) => "class#"
}

define_id! {
    /// Index of a field within its class binding.
    FieldIdx(u16) => "field#"
}

define_id! {
    /// Index of a local variable slot within a function frame.
    ///
    /// Parameters occupy the first slots, upvalues and locals follow in the
    /// order the resolver assigned them.
    Slot(u16) => "slot#"
}

define_id! {
    /// A compilation module. Function names are unique per module.
    ModuleId(u32) => "mod#"
}

impl ModuleId {
    /// Module used when a program has only one.
    pub const MAIN: ModuleId = ModuleId(0);
}

/// Anything that can be invoked: a script function/lambda or a native binding.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Callee {
    Func(FuncId),
    Native(NativeId),
}

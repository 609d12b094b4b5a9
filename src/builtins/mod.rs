//! The basic classes every Cool program starts out with.
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Static type of expressions whose type is the class of `self`.
pub const SELF_TYPE: &str = "SELF_TYPE";

/// A class provided by the runtime rather than by the program being compiled. Methods
/// inherited from these classes have no Cool source body and are never lowered.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Builtin {
    Object,
    Int,
    Bool,
    String,
    IO,
}
impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Object,
        Builtin::Int,
        Builtin::Bool,
        Builtin::String,
        Builtin::IO,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Object => "Object",
            Builtin::Int => "Int",
            Builtin::Bool => "Bool",
            Builtin::String => "String",
            Builtin::IO => "IO",
        }
    }

    /// Whether `class_name` names one of the basic classes.
    pub fn is_builtin(class_name: &str) -> bool {
        class_name.parse::<Builtin>().is_ok()
    }
}
impl Display for Builtin {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
impl FromStr for Builtin {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Builtin::ALL
            .into_iter()
            .find(|builtin| builtin.name() == s)
            .ok_or(())
    }
}

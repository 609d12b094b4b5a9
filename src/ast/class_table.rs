//! The resolved class/method table handed over by semantic analysis.
//!
//! Class and method indices are positions in this table. They are stable for the whole
//! compilation and are what dispatch targets in the generated code refer to.
use crate::builtins::Builtin;

use super::ExprId;

#[derive(Debug, Default)]
pub struct ClassTable {
    classes: Vec<ClassNode>,
}
impl ClassTable {
    pub fn new(classes: Vec<ClassNode>) -> Self {
        Self { classes }
    }

    pub fn class(&self, index: usize) -> Option<&ClassNode> {
        self.classes.get(index)
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ClassNode)> {
        self.classes.iter().enumerate()
    }

    /// All methods that need to be lowered: those of user-defined classes, except for the
    /// methods such a class inherited from one of the basic classes.
    pub fn user_methods(&self) -> impl Iterator<Item = (usize, usize, &ClassMethod)> {
        self.iter()
            .filter(|(_, class)| !class.is_builtin())
            .flat_map(|(class_index, class)| {
                class
                    .methods
                    .iter()
                    .enumerate()
                    .filter(|(_, method)| !method.is_inherited_builtin())
                    .map(move |(method_index, method)| (class_index, method_index, method))
            })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: String,
    /// Every method callable on an instance, inherited ones included, in dispatch table order.
    pub methods: Vec<ClassMethod>,
}
impl ClassNode {
    pub fn new<S: Into<String>>(name: S, methods: Vec<ClassMethod>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|method| method.name == name)
    }

    pub fn is_builtin(&self) -> bool {
        Builtin::is_builtin(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct ClassMethod {
    pub name: String,
    /// Name of the class that defines this method.
    pub inherited_from: String,
    pub body: Option<ExprId>,
}
impl ClassMethod {
    pub fn new<N, F>(name: N, inherited_from: F, body: Option<ExprId>) -> Self
    where
        N: Into<String>,
        F: Into<String>,
    {
        Self {
            name: name.into(),
            inherited_from: inherited_from.into(),
            body,
        }
    }

    pub fn is_inherited_builtin(&self) -> bool {
        Builtin::is_builtin(&self.inherited_from)
    }
}

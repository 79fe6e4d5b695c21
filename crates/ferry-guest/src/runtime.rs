//! The surface a foreign runtime exposes to the dispatcher.

use ferry_wire::{ClassInfo, FunctionInfo, ObjectRef, Thrown, Value};
use std::collections::HashSet;

/// Receiver of a method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Object(&'a ObjectRef),
    /// Static call on a class
    Class(&'a str),
}

/// Introspection and evaluation primitives of a foreign runtime.
///
/// Names of functions and classes are looked up case-insensitively by the
/// runtime; the introspection records report the canonical spelling.
/// Every fallible operation reports foreign errors as [`Thrown`].
pub trait ForeignRuntime {
    fn constant(&self, name: &str) -> Option<Value>;

    /// Define a new constant. Redefining an existing one fails.
    fn define_constant(&mut self, name: &str, value: Value) -> Result<(), Thrown>;

    fn constant_names(&self) -> Vec<String>;

    fn global(&self, name: &str) -> Option<Value>;

    fn set_global(&mut self, name: &str, value: Value);

    fn global_names(&self) -> Vec<String>;

    fn function_info(&self, name: &str) -> Option<FunctionInfo>;

    fn function_names(&self) -> Vec<String>;

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Thrown>;

    /// Describe a class or interface, including inherited members.
    fn class_info(&self, name: &str) -> Option<ClassInfo>;

    fn class_names(&self) -> Vec<String>;

    fn create_object(&mut self, class: &str, args: Vec<Value>) -> Result<Value, Thrown>;

    fn call_method(&mut self, target: Target<'_>, name: &str, args: Vec<Value>) -> Result<Value, Thrown>;

    fn get_property(&mut self, obj: &ObjectRef, name: &str) -> Result<Value, Thrown>;

    fn set_property(&mut self, obj: &ObjectRef, name: &str, value: Value) -> Result<(), Thrown>;

    fn unset_property(&mut self, obj: &ObjectRef, name: &str) -> Result<(), Thrown>;

    /// Properties set on the object that its class does not declare.
    fn dynamic_properties(&self, obj: &ObjectRef) -> Result<Vec<String>, Thrown>;

    /// Class of a live object, or `None` if the handle is unknown.
    fn object_class(&self, obj: &ObjectRef) -> Option<String>;

    /// Call an object as a function.
    fn invoke_object(&mut self, obj: &ObjectRef, args: Vec<Value>) -> Result<Value, Thrown> {
        self.call_method(Target::Object(obj), "__invoke", args)
    }

    /// Human-readable dump of a value.
    fn repr(&self, value: &Value) -> String;

    /// Program output produced by language constructs such as `echo`.
    fn write_output(&mut self, text: &str);

    /// Load and run a source unit.
    ///
    /// `once` skips units that already ran; `required` turns a missing unit
    /// into an error instead of a `false` result.
    fn include(&mut self, path: &str, once: bool, required: bool) -> Result<Value, Thrown>;

    /// Whether `class` is `ancestor` or extends or implements it, directly
    /// or transitively.
    fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        let mut pending = vec![class.to_string()];
        let mut seen = HashSet::new();
        while let Some(name) = pending.pop() {
            if name.eq_ignore_ascii_case(ancestor) {
                return true;
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                continue;
            }
            if let Some(info) = self.class_info(&name) {
                pending.extend(info.parent);
                pending.extend(info.interfaces);
            }
        }
        false
    }

    fn is_instance_of(&self, obj: &ObjectRef, class: &str) -> bool {
        match self.object_class(obj) {
            Some(own) => self.is_subclass(&own, class),
            None => false,
        }
    }
}

use std::{hash::Hash, ops::Deref, sync::Arc};

use crate::{FieldId, MethodId, PrimitiveValue, PropertyId, TypeId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeFlags {
    pub value_type: bool,
    pub primitive: bool,
    pub enum_type: bool,
    pub array: bool,
    pub interface: bool,
}

/// Metadata the target reports for a loaded type.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeInfo {
    pub id: TypeId,
    /// Simple name, e.g. `List`1` or `<>c__DisplayClass0_0`.
    pub name: String,
    /// Namespace-qualified name including nesting (`Outer+Inner`) and, for
    /// generic instantiations, the bracketed argument list.
    pub full_name: String,
    pub namespace: String,
    pub assembly: String,
    pub base: Option<TypeId>,
    pub declaring_type: Option<TypeId>,
    pub element_type: Option<TypeId>,
    pub generic_arity: usize,
    pub generic_arguments: Vec<TypeId>,
    pub flags: TypeFlags,
}

/// Non-owning, identity-comparable handle to a type in the target.
///
/// Two handles are equal when they name the same loaded type; the metadata
/// snapshot is shared and never mutated by the engine.
#[derive(Clone, Debug)]
pub struct RemoteType(Arc<TypeInfo>);

impl RemoteType {
    pub fn new(info: TypeInfo) -> Self {
        Self(Arc::new(info))
    }

    pub fn id(&self) -> TypeId {
        self.0.id
    }

    pub fn is_value_type(&self) -> bool {
        self.0.flags.value_type
    }

    pub fn is_primitive(&self) -> bool {
        self.0.flags.primitive
    }

    pub fn is_enum(&self) -> bool {
        self.0.flags.enum_type
    }

    pub fn is_array(&self) -> bool {
        self.0.flags.array
    }

    pub fn is_interface(&self) -> bool {
        self.0.flags.interface
    }

    /// `full_name` with any generic instantiation suffix removed.
    pub fn definition_name(&self) -> &str {
        match self.0.full_name.find('[') {
            Some(idx) if !self.0.flags.array => &self.0.full_name[..idx],
            _ => &self.0.full_name,
        }
    }

    /// Assembly-qualified name, as used inside generic argument lists.
    pub fn qualified_name(&self) -> String {
        format!("{}, {}", self.0.full_name, self.0.assembly)
    }
}

impl Deref for RemoteType {
    type Target = TypeInfo;

    fn deref(&self) -> &TypeInfo {
        &self.0
    }
}

impl PartialEq for RemoteType {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for RemoteType {}

impl Hash for RemoteType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// An argument stored in custom attribute metadata.
///
/// Attribute blobs carry their constant arguments inline, so reading them
/// never requires running code in the target.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeArgument {
    Null,
    Primitive(PrimitiveValue),
    String(String),
    Type(RemoteType),
    Array(Vec<AttributeArgument>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttribute {
    pub attribute_type: RemoteType,
    pub constructor_args: Vec<AttributeArgument>,
    pub named_args: Vec<(String, AttributeArgument)>,
}

impl CustomAttribute {
    pub fn named_arg(&self, name: &str) -> Option<&AttributeArgument> {
        self.named_args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub id: FieldId,
    pub name: String,
    pub declaring_type: TypeId,
    pub field_type: TypeId,
    pub is_static: bool,
    /// Compile-time constant (`const` or enum member).
    pub is_literal: bool,
    pub visibility: Visibility,
    pub attributes: Vec<CustomAttribute>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodInfo {
    pub id: MethodId,
    pub name: String,
    pub declaring_type: TypeId,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: Option<TypeId>,
    pub is_static: bool,
    pub is_virtual: bool,
    pub visibility: Visibility,
}

impl MethodInfo {
    pub const CONSTRUCTOR: &'static str = ".ctor";

    pub fn is_constructor(&self) -> bool {
        self.name == Self::CONSTRUCTOR
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub name: String,
    pub declaring_type: TypeId,
    pub property_type: TypeId,
    pub getter: Option<MethodInfo>,
    pub setter: Option<MethodInfo>,
    pub attributes: Vec<CustomAttribute>,
}

impl PropertyInfo {
    fn accessor(&self) -> Option<&MethodInfo> {
        self.getter.as_ref().or(self.setter.as_ref())
    }

    pub fn is_static(&self) -> bool {
        self.accessor().is_some_and(|m| m.is_static)
    }

    pub fn is_virtual(&self) -> bool {
        self.accessor().is_some_and(|m| m.is_virtual)
    }

    pub fn visibility(&self) -> Visibility {
        self.accessor()
            .map(|m| m.visibility)
            .unwrap_or(Visibility::Private)
    }

    /// A getter that takes no arguments, i.e. not an indexer.
    pub fn has_plain_getter(&self) -> bool {
        self.getter.as_ref().is_some_and(|g| g.parameters.is_empty())
    }
}

/// A local variable or argument slot in a stack frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalInfo {
    pub index: u32,
    /// `None` when the target's debug information does not name the slot.
    pub name: Option<String>,
    pub ty: TypeId,
    pub is_argument: bool,
}

use nova_remote::{
    FieldInfo, FrameId, InvokeTarget, LocalInfo, ObjectId, PropertyInfo, RemoteValue,
    StructValue, ThreadId, TypeId,
};

use crate::{EvalAdaptor, EvalError, EvalResult, EvaluationContext};

/// Where a field lives.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldTarget {
    Static(TypeId),
    Object(ObjectId),
    /// Field of a value-type snapshot; readable but not writable through the
    /// snapshot.
    Struct(StructValue),
}

impl FieldTarget {
    /// The target to use for `field` when reading it through `instance`.
    /// Returns `None` for instance fields without a usable receiver.
    pub fn for_field(field: &FieldInfo, instance: Option<&RemoteValue>) -> Option<Self> {
        if field.is_static {
            return Some(FieldTarget::Static(field.declaring_type));
        }
        match instance? {
            RemoteValue::Object { object, .. }
            | RemoteValue::String { object, .. }
            | RemoteValue::Array { object, .. } => Some(FieldTarget::Object(*object)),
            RemoteValue::Struct(s) => Some(FieldTarget::Struct(s.clone())),
            RemoteValue::Null | RemoteValue::Primitive(_) | RemoteValue::Enum { .. } => None,
        }
    }
}

/// Receiver for calling a method through `instance` (`None` for statics).
pub fn invoke_target(
    declaring_type: TypeId,
    is_static: bool,
    instance: Option<&RemoteValue>,
) -> Option<InvokeTarget> {
    if is_static {
        return Some(InvokeTarget::Type(declaring_type));
    }
    match instance? {
        RemoteValue::Object { object, .. }
        | RemoteValue::String { object, .. }
        | RemoteValue::Array { object, .. } => Some(InvokeTarget::Object(*object)),
        RemoteValue::Struct(s) => Some(InvokeTarget::Struct(s.clone())),
        RemoteValue::Null | RemoteValue::Primitive(_) | RemoteValue::Enum { .. } => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReferenceKind {
    /// A local variable or (when `local.is_argument`) a parameter.
    Local { frame: FrameId, local: LocalInfo },
    Field { field: FieldInfo, target: FieldTarget },
    Property {
        property: PropertyInfo,
        target: InvokeTarget,
    },
    ArrayElement { array: ObjectId, index: usize },
    /// `target[index...]` through the type's indexer accessors.
    IndexerElement {
        property: PropertyInfo,
        target: InvokeTarget,
        index: Vec<RemoteValue>,
    },
    This(RemoteValue),
    Literal(RemoteValue),
    Exception { thread: ThreadId },
}

/// A named, typed slot that can be read and, where mutable, written.
///
/// The declared type never changes; the value read may differ after the
/// debuggee resumed and suspended again.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueReference {
    name: String,
    declared_type: Option<TypeId>,
    kind: ReferenceKind,
}

impl ValueReference {
    pub fn local(frame: FrameId, local: LocalInfo, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(local.ty),
            kind: ReferenceKind::Local { frame, local },
        }
    }

    pub fn field(field: FieldInfo, target: FieldTarget) -> Self {
        Self {
            name: field.name.clone(),
            declared_type: Some(field.field_type),
            kind: ReferenceKind::Field { field, target },
        }
    }

    pub fn property(property: PropertyInfo, target: InvokeTarget) -> Self {
        Self {
            name: property.name.clone(),
            declared_type: Some(property.property_type),
            kind: ReferenceKind::Property { property, target },
        }
    }

    pub fn array_element(array: ObjectId, index: usize, element_type: Option<TypeId>) -> Self {
        Self {
            name: format!("[{index}]"),
            declared_type: element_type,
            kind: ReferenceKind::ArrayElement { array, index },
        }
    }

    pub fn indexer_element(
        property: PropertyInfo,
        target: InvokeTarget,
        index: Vec<RemoteValue>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(property.property_type),
            kind: ReferenceKind::IndexerElement {
                property,
                target,
                index,
            },
        }
    }

    pub fn this(value: RemoteValue) -> Self {
        Self {
            name: "this".to_string(),
            declared_type: value.remote_type().map(|t| t.id()),
            kind: ReferenceKind::This(value),
        }
    }

    pub fn literal(name: impl Into<String>, value: RemoteValue) -> Self {
        Self {
            name: name.into(),
            declared_type: value.remote_type().map(|t| t.id()),
            kind: ReferenceKind::Literal(value),
        }
    }

    pub fn exception(thread: ThreadId, declared_type: Option<TypeId>) -> Self {
        Self {
            name: "$exception".to_string(),
            declared_type,
            kind: ReferenceKind::Exception { thread },
        }
    }

    /// Same slot, shown under another name (hoisted locals, reconstructed
    /// `this`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<TypeId> {
        self.declared_type
    }

    pub fn kind(&self) -> &ReferenceKind {
        &self.kind
    }

    /// Type declaring the member behind this reference, for fields and
    /// properties.
    pub fn declaring_type(&self) -> Option<TypeId> {
        match &self.kind {
            ReferenceKind::Field { field, .. } => Some(field.declaring_type),
            ReferenceKind::Property { property, .. }
            | ReferenceKind::IndexerElement { property, .. } => Some(property.declaring_type),
            _ => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        match &self.kind {
            ReferenceKind::Local { .. } | ReferenceKind::ArrayElement { .. } => false,
            ReferenceKind::Field { field, target } => {
                field.is_literal || matches!(target, FieldTarget::Struct(_))
            }
            ReferenceKind::Property { property, .. }
            | ReferenceKind::IndexerElement { property, .. } => property.setter.is_none(),
            ReferenceKind::This(_)
            | ReferenceKind::Literal(_)
            | ReferenceKind::Exception { .. } => true,
        }
    }

    pub fn read(&self, eval: &EvalAdaptor, ctx: &EvaluationContext) -> EvalResult<RemoteValue> {
        let client = eval.client();
        match &self.kind {
            ReferenceKind::Local { frame, local } => Ok(client.local_value(*frame, local)?),
            ReferenceKind::Field { field, target } => match target {
                FieldTarget::Static(ty) => Ok(client.static_field(*ty, field.id, ctx.thread)?),
                FieldTarget::Object(object) => Ok(client.instance_field(*object, field.id)?),
                FieldTarget::Struct(s) => {
                    Ok(s.field(field.id).cloned().unwrap_or(RemoteValue::Null))
                }
            },
            ReferenceKind::Property { property, target } => {
                if !ctx.options.allow_target_invoke {
                    return Err(EvalError::InvocationDisabled);
                }
                let getter = property.getter.as_ref().ok_or_else(|| {
                    EvalError::NotSupported(format!("property `{}` has no getter", property.name))
                })?;
                eval.invoke_method(ctx, target.clone(), getter, Vec::new())
            }
            ReferenceKind::ArrayElement { array, index } => Ok(client.array_get(*array, *index)?),
            ReferenceKind::IndexerElement {
                property,
                target,
                index,
            } => {
                if !ctx.options.allow_target_invoke {
                    return Err(EvalError::InvocationDisabled);
                }
                let getter = property.getter.as_ref().ok_or_else(|| {
                    EvalError::NotSupported(format!("indexer `{}` has no getter", property.name))
                })?;
                eval.invoke_method(ctx, target.clone(), getter, index.clone())
            }
            ReferenceKind::This(value) | ReferenceKind::Literal(value) => Ok(value.clone()),
            ReferenceKind::Exception { thread } => Ok(client
                .current_exception(*thread)?
                .unwrap_or(RemoteValue::Null)),
        }
    }

    pub fn write(
        &self,
        eval: &EvalAdaptor,
        ctx: &EvaluationContext,
        value: RemoteValue,
    ) -> EvalResult<()> {
        if self.is_read_only() {
            return Err(EvalError::ReadOnly(self.name.clone()));
        }
        let client = eval.client();
        match &self.kind {
            ReferenceKind::Local { frame, local } => {
                Ok(client.set_local_value(*frame, local, value)?)
            }
            ReferenceKind::Field { field, target } => match target {
                FieldTarget::Static(ty) => Ok(client.set_static_field(*ty, field.id, value)?),
                FieldTarget::Object(object) => {
                    Ok(client.set_instance_field(*object, field.id, value)?)
                }
                FieldTarget::Struct(_) => Err(EvalError::ReadOnly(self.name.clone())),
            },
            ReferenceKind::Property { property, target } => {
                if !ctx.options.allow_target_invoke {
                    return Err(EvalError::InvocationDisabled);
                }
                let setter = property
                    .setter
                    .as_ref()
                    .ok_or_else(|| EvalError::ReadOnly(self.name.clone()))?;
                eval.invoke_method(ctx, target.clone(), setter, vec![value])
                    .map(|_| ())
            }
            ReferenceKind::ArrayElement { array, index } => {
                Ok(client.array_set(*array, *index, value)?)
            }
            ReferenceKind::IndexerElement {
                property,
                target,
                index,
            } => {
                if !ctx.options.allow_target_invoke {
                    return Err(EvalError::InvocationDisabled);
                }
                let setter = property
                    .setter
                    .as_ref()
                    .ok_or_else(|| EvalError::ReadOnly(self.name.clone()))?;
                let mut args = index.clone();
                args.push(value);
                eval.invoke_method(ctx, target.clone(), setter, args)
                    .map(|_| ())
            }
            ReferenceKind::This(_)
            | ReferenceKind::Literal(_)
            | ReferenceKind::Exception { .. } => {
                Err(EvalError::ReadOnly(self.name.clone()))
            }
        }
    }
}

//! Casts and conversions between remote values.
//!
//! [`try_cast`] only performs conversions that need no code in the debuggee:
//! reference conversions along the inheritance chain, implicit numeric
//! widening, unboxing and enum/integer casts. [`try_convert`] adds explicit
//! numeric narrowing and, when calls are permitted, user-defined
//! `op_Implicit`/`op_Explicit` operators.

use nova_remote::{
    DebuggeeClient, InvokeTarget, MethodInfo, PrimitiveValue, RemoteType, RemoteValue,
};

use crate::{
    hierarchy::{implicit_numeric, is_assignable, OBJECT, VALUE_TYPE},
    EvalAdaptor, EvalError, EvalResult, EvaluationContext,
};

const BOXED_VALUE_FIELD: &str = "m_value";
const ENUM_VALUE_FIELD: &str = "value__";

/// Converts `value` to the primitive type named `target` with unchecked
/// (wrapping, truncating) semantics. `bool` only converts to itself.
pub fn convert_primitive(value: PrimitiveValue, target: &str) -> Option<PrimitiveValue> {
    let is_bool = matches!(value, PrimitiveValue::Bool(_));
    if is_bool || target == "System.Boolean" {
        return (is_bool && target == "System.Boolean").then_some(value);
    }

    let float = value.as_f64()?;
    let whole = value.as_i128().unwrap_or(float as i128);
    Some(match target {
        "System.Char" => PrimitiveValue::Char(whole as u16),
        "System.SByte" => PrimitiveValue::I8(whole as i8),
        "System.Byte" => PrimitiveValue::U8(whole as u8),
        "System.Int16" => PrimitiveValue::I16(whole as i16),
        "System.UInt16" => PrimitiveValue::U16(whole as u16),
        "System.Int32" => PrimitiveValue::I32(whole as i32),
        "System.UInt32" => PrimitiveValue::U32(whole as u32),
        "System.Int64" => PrimitiveValue::I64(whole as i64),
        "System.UInt64" => PrimitiveValue::U64(whole as u64),
        "System.Single" => PrimitiveValue::F32(match value.as_i128() {
            Some(v) => v as f32,
            None => float as f32,
        }),
        "System.Double" => PrimitiveValue::F64(float),
        _ => return None,
    })
}

/// The scalar inside a boxed primitive object.
pub(crate) fn unbox(
    client: &dyn DebuggeeClient,
    value: &RemoteValue,
) -> EvalResult<Option<PrimitiveValue>> {
    let RemoteValue::Object { object, ty } = value else {
        return Ok(None);
    };
    if !ty.is_primitive() {
        return Ok(None);
    }
    let Some(field) = client
        .fields(ty.id())?
        .into_iter()
        .find(|f| !f.is_static && f.name == BOXED_VALUE_FIELD)
    else {
        return Ok(None);
    };
    Ok(match client.instance_field(*object, field.id)? {
        RemoteValue::Primitive(p) => Some(p),
        _ => None,
    })
}

/// Full name of an enum's underlying integral type.
fn enum_underlying(client: &dyn DebuggeeClient, ty: &RemoteType) -> EvalResult<String> {
    let underlying = client
        .fields(ty.id())?
        .into_iter()
        .find(|f| !f.is_static && f.name == ENUM_VALUE_FIELD)
        .map(|f| client.type_info(f.field_type))
        .transpose()?;
    Ok(underlying
        .map(|t| t.full_name.clone())
        .unwrap_or_else(|| "System.Int32".to_string()))
}

fn is_universal_base(ty: &RemoteType) -> bool {
    ty.full_name == OBJECT || ty.full_name == VALUE_TYPE
}

/// Converts without running code in the debuggee. `Ok(None)` means no such
/// conversion exists.
pub fn try_cast(
    eval: &EvalAdaptor,
    value: &RemoteValue,
    target: &RemoteType,
) -> EvalResult<Option<RemoteValue>> {
    let client = eval.client();
    match value {
        RemoteValue::Null => Ok((!target.is_value_type()).then_some(RemoteValue::Null)),
        RemoteValue::Primitive(p) => {
            if target.is_primitive() {
                return Ok(implicit_numeric(p.type_name(), &target.full_name)
                    .then(|| convert_primitive(*p, &target.full_name))
                    .flatten()
                    .map(RemoteValue::Primitive));
            }
            if is_universal_base(target) {
                return Ok(Some(value.clone()));
            }
            if target.is_enum() && p.as_i128().is_some() {
                let underlying = enum_underlying(client, target)?;
                return Ok(convert_primitive(*p, &underlying).map(|value| RemoteValue::Enum {
                    ty: target.clone(),
                    value,
                }));
            }
            Ok(None)
        }
        RemoteValue::Enum { ty, value: raw } => {
            if target.is_primitive() {
                return Ok(convert_primitive(*raw, &target.full_name).map(RemoteValue::Primitive));
            }
            Ok(is_assignable(client, target, ty)?.then(|| value.clone()))
        }
        RemoteValue::String { ty, .. }
        | RemoteValue::Array { ty, .. }
        | RemoteValue::Object { ty, .. } => {
            if target.is_primitive() {
                if let Some(p) = unbox(client, value)? {
                    return Ok(implicit_numeric(p.type_name(), &target.full_name)
                        .then(|| convert_primitive(p, &target.full_name))
                        .flatten()
                        .map(RemoteValue::Primitive));
                }
            }
            Ok(is_assignable(client, target, ty)?.then(|| value.clone()))
        }
        RemoteValue::Struct(s) => Ok(is_assignable(client, target, &s.ty)?.then(|| value.clone())),
    }
}

/// Like [`try_cast`], plus explicit numeric conversions and user-defined
/// conversion operators declared on the source or target type.
pub fn try_convert(
    eval: &EvalAdaptor,
    ctx: &EvaluationContext,
    value: &RemoteValue,
    target: &RemoteType,
) -> EvalResult<Option<RemoteValue>> {
    if let Some(cast) = try_cast(eval, value, target)? {
        return Ok(Some(cast));
    }

    if target.is_primitive() {
        let scalar = match value {
            RemoteValue::Primitive(p) | RemoteValue::Enum { value: p, .. } => Some(*p),
            _ => unbox(eval.client(), value)?,
        };
        if let Some(p) = scalar {
            return Ok(convert_primitive(p, &target.full_name).map(RemoteValue::Primitive));
        }
    }

    let Some(source) = value.remote_type() else {
        return Ok(None);
    };
    let Some(operator) = find_conversion_operator(eval, source, target)? else {
        return Ok(None);
    };
    if !ctx.options.allow_target_invoke {
        debug_assert!(
            false,
            "conversion `{}` -> `{}` needs a call into the debuggee while calls are disabled",
            source.full_name, target.full_name
        );
        return Err(EvalError::InvocationDisabled);
    }
    let result = eval.invoke_method(
        ctx,
        InvokeTarget::Type(operator.declaring_type),
        &operator,
        vec![value.clone()],
    )?;
    Ok(Some(result))
}

fn find_conversion_operator(
    eval: &EvalAdaptor,
    source: &RemoteType,
    target: &RemoteType,
) -> EvalResult<Option<MethodInfo>> {
    let client = eval.client();
    for owner in [source, target] {
        for name in ["op_Implicit", "op_Explicit"] {
            for method in eval.methods_named(owner, name)?.iter() {
                let [param] = method.parameters.as_slice() else {
                    continue;
                };
                if !method.is_static || method.return_type != Some(target.id()) {
                    continue;
                }
                let param_type = client.type_info(param.ty)?;
                if is_assignable(client, &param_type, source)? {
                    return Ok(Some(method.clone()));
                }
            }
        }
    }
    Ok(None)
}

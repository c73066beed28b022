use std::borrow::Cow;

use nova_remote::{ObjectId, PrimitiveValue, RemoteType, RemoteValue};

use crate::{
    coerce::unbox,
    hierarchy::{ENUM, OBJECT, VALUE_TYPE},
    overload::{resolve_overload, OverloadQuery},
    type_names::display_type_name,
    EvalAdaptor, EvalResult, EvaluationContext,
};

/// Truncates `s` to `max_len` characters followed by `marker`. Strings of at
/// most `max_len` characters are returned unchanged.
pub fn ellipsize<'a>(s: &'a str, max_len: usize, marker: &str) -> Cow<'a, str> {
    match s.char_indices().nth(max_len) {
        Some((cut, _)) => Cow::Owned(format!("{}{marker}", &s[..cut])),
        None => Cow::Borrowed(s),
    }
}

pub(crate) fn value_to_string(
    eval: &EvalAdaptor,
    ctx: &EvaluationContext,
    value: &RemoteValue,
) -> EvalResult<String> {
    let client = eval.client();
    match value {
        RemoteValue::Null => Ok("null".to_string()),
        RemoteValue::Primitive(p) => Ok(p.to_string()),
        RemoteValue::String { object, .. } => string_text(eval, ctx, *object),
        RemoteValue::Enum { ty, value } => enum_to_string(eval, ctx, ty, *value),
        RemoteValue::Array { object, ty } => {
            let length = client.array_length(*object)?;
            let element = match ty.element_type {
                Some(id) => display_type_name(client, &client.type_info(id)?)?,
                None => "object".to_string(),
            };
            Ok(format!("{{{element}[{length}]}}"))
        }
        RemoteValue::Object { ty, .. } => {
            if let Some(p) = unbox(client, value)? {
                return Ok(p.to_string());
            }
            object_to_string(eval, ctx, ty, value)
        }
        RemoteValue::Struct(s) => object_to_string(eval, ctx, &s.ty, value),
    }
}

fn string_text(
    eval: &EvalAdaptor,
    ctx: &EvaluationContext,
    object: ObjectId,
) -> EvalResult<String> {
    let text = eval.client().string_value(object)?;
    if !ctx.options.ellipsize_strings {
        return Ok(text);
    }
    let config = eval.config();
    Ok(ellipsize(&text, config.ellipsis_length, &config.ellipsis_marker).into_owned())
}

/// Uses a user-declared `ToString` when calls are permitted; the
/// implementations on the universal base types only print the type name and
/// are never called.
fn object_to_string(
    eval: &EvalAdaptor,
    ctx: &EvaluationContext,
    ty: &RemoteType,
    value: &RemoteValue,
) -> EvalResult<String> {
    let client = eval.client();
    let fallback =
        || -> EvalResult<String> { Ok(format!("{{{}}}", display_type_name(client, ty)?)) };
    if !(ctx.options.allow_target_invoke && ctx.options.allow_to_string_calls) {
        return fallback();
    }

    let query = OverloadQuery {
        allow_static: false,
        throw_if_not_found: false,
        ..OverloadQuery::new("ToString", ty, &[])
    };
    let Some(method) = resolve_overload(client, eval.method_cache(), ctx, &query)? else {
        return fallback();
    };
    let declaring = client.type_info(method.declaring_type)?;
    if [OBJECT, VALUE_TYPE, ENUM].contains(&declaring.full_name.as_str()) {
        return fallback();
    }
    let Some(target) = crate::value_ref::invoke_target(method.declaring_type, false, Some(value))
    else {
        return fallback();
    };
    match eval.invoke_method(ctx, target, &method, Vec::new())? {
        RemoteValue::String { object, .. } => string_text(eval, ctx, object),
        RemoteValue::Null => fallback(),
        other => value_to_string(eval, ctx, &other),
    }
}

/// The constant name for `raw`, or a `A | B` combination of flag constants,
/// or the number itself.
fn enum_to_string(
    eval: &EvalAdaptor,
    ctx: &EvaluationContext,
    ty: &RemoteType,
    raw: PrimitiveValue,
) -> EvalResult<String> {
    let client = eval.client();
    let Some(raw_int) = raw.as_i128() else {
        return Ok(raw.to_string());
    };

    let mut constants = Vec::new();
    for field in client.fields(ty.id())? {
        if !(field.is_static && field.is_literal) {
            continue;
        }
        let constant = match client.static_field(ty.id(), field.id, ctx.thread)? {
            RemoteValue::Enum { value, .. } | RemoteValue::Primitive(value) => value.as_i128(),
            _ => None,
        };
        if let Some(constant) = constant {
            if constant == raw_int {
                return Ok(field.name);
            }
            constants.push((field.name, constant));
        }
    }

    if raw_int != 0 {
        let mut remaining = raw_int;
        let mut names = Vec::new();
        for (name, constant) in &constants {
            if *constant != 0 && remaining & constant == *constant {
                remaining &= !constant;
                names.push(name.as_str());
            }
        }
        if remaining == 0 && !names.is_empty() {
            return Ok(names.join(" | "));
        }
    }
    Ok(raw_int.to_string())
}

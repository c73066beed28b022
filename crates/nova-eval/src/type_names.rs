//! Parsing of runtime type names and resolution of names to loaded types.
//!
//! Runtime names look like
//! ``System.Collections.Generic.Dictionary`2[[System.String, mscorlib],[App.Item, App]]``:
//! an arity marker after the backtick, then a bracketed argument list whose
//! elements are usually themselves bracket-wrapped, assembly-qualified names.

use std::collections::BTreeSet;

use nova_remote::{ClientResult, DebuggeeClient, RemoteType};

use crate::{EvalResult, EvaluationContext};

/// Source keyword aliases of the core types.
const KEYWORDS: &[(&str, &str)] = &[
    ("bool", "System.Boolean"),
    ("byte", "System.Byte"),
    ("sbyte", "System.SByte"),
    ("char", "System.Char"),
    ("short", "System.Int16"),
    ("ushort", "System.UInt16"),
    ("int", "System.Int32"),
    ("uint", "System.UInt32"),
    ("long", "System.Int64"),
    ("ulong", "System.UInt64"),
    ("float", "System.Single"),
    ("double", "System.Double"),
    ("decimal", "System.Decimal"),
    ("string", "System.String"),
    ("object", "System.Object"),
    ("void", "System.Void"),
];

/// `System.Int32` for `int`, and so on.
pub fn keyword_type_name(keyword: &str) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, full)| *full)
}

/// `int` for `System.Int32`, and so on.
pub fn type_keyword(full_name: &str) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|(_, full)| *full == full_name)
        .map(|(k, _)| *k)
}

/// Byte offsets of the commas of `s` that are not nested inside brackets.
fn top_level_commas(s: &str) -> Vec<usize> {
    let mut depth = 0usize;
    let mut commas = Vec::new();
    for (idx, ch) in s.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => commas.push(idx),
            _ => {}
        }
    }
    commas
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for comma in top_level_commas(s) {
        parts.push(&s[start..comma]);
        start = comma + 1;
    }
    parts.push(&s[start..]);
    parts
}

/// Drops a trailing `, Assembly, Version=...` suffix.
pub fn strip_assembly_qualification(name: &str) -> &str {
    match top_level_commas(name).first() {
        Some(&idx) => name[..idx].trim(),
        None => name.trim(),
    }
}

/// Total generic arity declared in `definition` (nested generic types carry
/// one marker per level). `None` when a marker does not fit in `usize`.
fn generic_arity(definition: &str) -> Option<usize> {
    definition.split('`').skip(1).try_fold(0usize, |total, part| {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Some(total);
        }
        total.checked_add(digits.parse::<usize>().ok()?)
    })
}

/// `[Name, Assembly]` -> `Name, Assembly`; anything else is only trimmed.
fn unwrap_argument(part: &str) -> String {
    let part = part.trim();
    match part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        Some(inner) => inner.trim().to_string(),
        None => part.to_string(),
    }
}

/// The type argument names of a generic instantiation name, in order.
///
/// Bracket-wrapped arguments are unwrapped (their assembly qualification is
/// kept and stripped again on resolution). When some argument is not wrapped,
/// commas cannot be told apart from assembly qualifiers, so only as many
/// leading elements as the arity allows are taken. Names with an arity marker
/// too large to represent have no readable arguments.
pub fn parse_generic_args(qualified_name: &str) -> Vec<String> {
    let Some(tick) = qualified_name.find('`') else {
        return Vec::new();
    };
    let Some(open) = qualified_name[tick..].find('[').map(|i| i + tick) else {
        return Vec::new();
    };
    let arity = match generic_arity(&qualified_name[..open]) {
        Some(0) | None => return Vec::new(),
        Some(arity) => arity,
    };

    let mut depth = 0usize;
    let mut close = None;
    for (idx, ch) in qualified_name[open..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    // An unterminated list still yields what can be read.
    let inner = match close {
        Some(close) => &qualified_name[open + 1..close],
        None => &qualified_name[open + 1..],
    };
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let parts = split_top_level(inner);
    let wrapped = parts.iter().all(|p| {
        let p = p.trim();
        p.starts_with('[') && p.ends_with(']')
    });
    let count = if wrapped { parts.len() } else { arity };
    parts.into_iter().take(count).map(unwrap_argument).collect()
}

/// `definition[[Arg1, asm1],[Arg2, asm2]]`, the runtime form of a closed
/// generic name. The arity marker is added if `definition` lacks one.
pub fn qualify_generic(definition: &str, args: &[RemoteType]) -> String {
    let mut name = definition.to_string();
    if !name.contains('`') {
        name.push_str(&format!("`{}", args.len()));
    }
    let list = args
        .iter()
        .map(|a| format!("[{}]", a.qualified_name()))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}[{list}]")
}

/// Looks a runtime or keyword type name up among the loaded types.
///
/// The session's global index is consulted first, then each loaded module.
/// Returns `None` when the name is unknown everywhere.
pub fn resolve_type(
    client: &dyn DebuggeeClient,
    name: &str,
    generic_args: &[RemoteType],
) -> ClientResult<Option<RemoteType>> {
    let name = strip_assembly_qualification(name);
    let (element, rank) = split_array_suffix(name);
    let element = keyword_type_name(element).unwrap_or(element);
    let mut full_name = if generic_args.is_empty() {
        element.to_string()
    } else {
        qualify_generic(element, generic_args)
    };
    for _ in 0..rank {
        full_name.push_str("[]");
    }

    if let Some(ty) = client.find_type(&full_name)? {
        return Ok(Some(ty));
    }
    for module in client.modules()? {
        if let Some(ty) = client.module_find_type(module, &full_name)? {
            tracing::trace!(
                target: "nova.eval",
                type_name = %full_name,
                %module,
                "type found by module search"
            );
            return Ok(Some(ty));
        }
    }
    Ok(None)
}

fn split_array_suffix(name: &str) -> (&str, usize) {
    let mut element = name;
    let mut rank = 0;
    while let Some(stripped) = element.strip_suffix("[]") {
        element = stripped;
        rank += 1;
    }
    (element, rank)
}

/// Namespaces of loaded types starting with `prefix`, sorted.
pub fn namespaces(
    client: &dyn DebuggeeClient,
    ctx: &EvaluationContext,
    prefix: &str,
) -> EvalResult<Vec<String>> {
    let set: BTreeSet<String> = client
        .all_types()?
        .into_iter()
        .map(|t| t.namespace.clone())
        .filter(|ns| !ns.is_empty() && starts_with(ctx, ns, prefix))
        .collect();
    Ok(set.into_iter().collect())
}

/// Top-level, non-instantiated types declared directly in `namespace`.
pub fn types_in_namespace(
    client: &dyn DebuggeeClient,
    ctx: &EvaluationContext,
    namespace: &str,
) -> EvalResult<Vec<RemoteType>> {
    Ok(client
        .all_types()?
        .into_iter()
        .filter(|t| {
            ctx.names_match(&t.namespace, namespace)
                && t.declaring_type.is_none()
                && !t.is_array()
                && t.generic_arguments.is_empty()
        })
        .collect())
}

fn starts_with(ctx: &EvaluationContext, s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| ctx.names_match(head, prefix))
}

/// Source-style name: `int`, `List<string>`, `Outer.Inner`, `int[]`.
pub fn display_type_name(client: &dyn DebuggeeClient, ty: &RemoteType) -> ClientResult<String> {
    if ty.is_array() {
        if let Some(element) = ty.element_type {
            let element = client.type_info(element)?;
            return Ok(format!("{}[]", display_type_name(client, &element)?));
        }
    }
    if let Some(keyword) = type_keyword(ty.definition_name()) {
        return Ok(keyword.to_string());
    }

    let simple = ty.name.split('`').next().unwrap_or(&ty.name);
    let mut name = match ty.declaring_type {
        Some(outer) => {
            let outer = client.type_info(outer)?;
            format!("{}.{simple}", display_type_name(client, &outer)?)
        }
        None => simple.to_string(),
    };
    if !ty.generic_arguments.is_empty() {
        let args = ty
            .generic_arguments
            .iter()
            .map(|id| client.type_info(*id).and_then(|a| display_type_name(client, &a)))
            .collect::<ClientResult<Vec<_>>>()?;
        name.push_str(&format!("<{}>", args.join(", ")));
    } else if ty.generic_arity > 0 {
        name.push_str(&format!("<{}>", ",".repeat(ty.generic_arity - 1)));
    }
    Ok(name)
}

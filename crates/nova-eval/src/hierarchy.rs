use std::collections::{HashSet, VecDeque};

use nova_remote::{ClientResult, DebuggeeClient, RemoteType};

pub(crate) const OBJECT: &str = "System.Object";
pub(crate) const VALUE_TYPE: &str = "System.ValueType";
pub(crate) const ENUM: &str = "System.Enum";

/// `ty` followed by each of its base types, most derived first.
pub fn base_chain(client: &dyn DebuggeeClient, ty: &RemoteType) -> ClientResult<Vec<RemoteType>> {
    let mut chain = vec![ty.clone()];
    let mut seen = HashSet::from([ty.id()]);
    let mut next = ty.base;
    while let Some(id) = next {
        if !seen.insert(id) {
            tracing::warn!(
                target: "nova.eval",
                type_name = %ty.full_name,
                "cyclic base type chain"
            );
            break;
        }
        let base = client.type_info(id)?;
        next = base.base;
        chain.push(base);
    }
    Ok(chain)
}

/// Whether `ty` is `ancestor` or derives from it.
pub fn is_subclass_of(
    client: &dyn DebuggeeClient,
    ty: &RemoteType,
    ancestor: &RemoteType,
) -> ClientResult<bool> {
    Ok(base_chain(client, ty)?.iter().any(|t| t == ancestor))
}

/// Every interface `ty` implements: its own, those of its base types and
/// those the interfaces themselves extend.
pub fn implemented_interfaces(
    client: &dyn DebuggeeClient,
    ty: &RemoteType,
) -> ClientResult<Vec<RemoteType>> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<RemoteType> = base_chain(client, ty)?.into();
    while let Some(next) = queue.pop_front() {
        for interface in client.interfaces(next.id())? {
            if seen.insert(interface.id()) {
                queue.push_back(interface.clone());
                found.push(interface);
            }
        }
    }
    Ok(found)
}

/// Whether a value of type `source` may be passed where `target` is expected
/// without a user-defined conversion.
pub fn is_assignable(
    client: &dyn DebuggeeClient,
    target: &RemoteType,
    source: &RemoteType,
) -> ClientResult<bool> {
    if target == source || target.full_name == OBJECT {
        return Ok(true);
    }
    if target.is_primitive() && source.is_primitive() {
        return Ok(implicit_numeric(&source.full_name, &target.full_name));
    }
    if target.is_interface() {
        return Ok(implemented_interfaces(client, source)?.contains(target));
    }
    is_subclass_of(client, source, target)
}

/// C# implicit numeric conversions between primitive type names.
pub fn implicit_numeric(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    let widening: &[&str] = match from {
        "System.SByte" => &[
            "System.Int16",
            "System.Int32",
            "System.Int64",
            "System.Single",
            "System.Double",
        ],
        "System.Byte" => &[
            "System.Int16",
            "System.UInt16",
            "System.Int32",
            "System.UInt32",
            "System.Int64",
            "System.UInt64",
            "System.Single",
            "System.Double",
        ],
        "System.Int16" => &["System.Int32", "System.Int64", "System.Single", "System.Double"],
        "System.UInt16" | "System.Char" => &[
            "System.Int32",
            "System.UInt32",
            "System.Int64",
            "System.UInt64",
            "System.Single",
            "System.Double",
        ],
        "System.Int32" => &["System.Int64", "System.Single", "System.Double"],
        "System.UInt32" => &[
            "System.Int64",
            "System.UInt64",
            "System.Single",
            "System.Double",
        ],
        "System.Int64" | "System.UInt64" => &["System.Single", "System.Double"],
        "System.Single" => &["System.Double"],
        _ => &[],
    };
    widening.contains(&to) || (from == "System.Char" && to == "System.UInt16")
}

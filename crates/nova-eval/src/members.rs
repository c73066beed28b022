//! Field and property lookup along a type's inheritance chain.

use std::collections::{HashMap, HashSet};

use nova_remote::{DebuggeeClient, FieldInfo, PropertyInfo, RemoteType, RemoteValue};

use crate::{
    display::is_compiler_generated,
    hierarchy::base_chain,
    value_ref::{invoke_target, FieldTarget},
    EvalResult, EvaluationContext, ValueReference,
};

/// Which members an enumeration yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingFlags {
    pub instance: bool,
    pub statics: bool,
    pub public: bool,
    pub non_public: bool,
    /// Only members declared on the type itself, not on its bases.
    pub declared_only: bool,
    /// Skip members declared on base types outside user code.
    pub just_my_code: bool,
}

impl BindingFlags {
    pub const ALL: BindingFlags = BindingFlags {
        instance: true,
        statics: true,
        public: true,
        non_public: true,
        declared_only: false,
        just_my_code: false,
    };

    pub const PUBLIC_INSTANCE: BindingFlags = BindingFlags {
        statics: false,
        non_public: false,
        ..BindingFlags::ALL
    };

    pub fn admits(&self, is_static: bool, is_public: bool) -> bool {
        let scope = if is_static { self.statics } else { self.instance };
        let access = if is_public { self.public } else { self.non_public };
        scope && access
    }
}

impl Default for BindingFlags {
    fn default() -> Self {
        Self::ALL
    }
}

fn bind_field(field: &FieldInfo, instance: Option<&RemoteValue>) -> Option<ValueReference> {
    FieldTarget::for_field(field, instance)
        .map(|target| ValueReference::field(field.clone(), target))
}

fn bind_property(
    property: &PropertyInfo,
    instance: Option<&RemoteValue>,
) -> Option<ValueReference> {
    invoke_target(property.declaring_type, property.is_static(), instance)
        .map(|target| ValueReference::property(property.clone(), target))
}

/// Finds the field or (non-indexer) property `name` visible on `ty`.
///
/// Levels are searched from the most derived type outwards and the search
/// stops at the first level defining `name`; the member there is returned
/// only if it is static or `instance` is provided. When the context is case
/// insensitive, the first case-insensitive match is kept as a fallback, but an
/// exact match on any level wins over it.
pub fn find_member(
    client: &dyn DebuggeeClient,
    ctx: &EvaluationContext,
    ty: &RemoteType,
    instance: Option<&RemoteValue>,
    name: &str,
) -> EvalResult<Option<ValueReference>> {
    let mut fallback = None;
    for level in base_chain(client, ty)? {
        let fields = client.fields(level.id())?;
        if let Some(field) = fields.iter().find(|f| f.name == name) {
            return Ok(bind_field(field, instance));
        }

        let properties = client.properties(level.id())?;
        if let Some(property) = properties
            .iter()
            .find(|p| p.name == name && p.has_plain_getter())
        {
            return Ok(bind_property(property, instance));
        }

        if !ctx.options.case_sensitive && fallback.is_none() {
            fallback = fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
                .and_then(|f| bind_field(f, instance))
                .or_else(|| {
                    properties
                        .iter()
                        .find(|p| p.name.eq_ignore_ascii_case(name) && p.has_plain_getter())
                        .and_then(|p| bind_property(p, instance))
                });
        }
    }
    Ok(fallback)
}

/// Virtual property overrides declared strictly between `runtime` and
/// `declared`, keyed by name (most derived wins).
fn collect_overrides(
    client: &dyn DebuggeeClient,
    runtime: &RemoteType,
    declared: &RemoteType,
) -> EvalResult<HashMap<String, PropertyInfo>> {
    let mut overrides = HashMap::new();
    for level in base_chain(client, runtime)? {
        if level == *declared {
            return Ok(overrides);
        }
        for property in client.properties(level.id())? {
            if property.is_virtual() && property.has_plain_getter() {
                overrides.entry(property.name.clone()).or_insert(property);
            }
        }
    }
    // `runtime` does not derive from `declared`; dispatch cannot be predicted.
    Ok(HashMap::new())
}

/// Fields and properties of `declared` (and, unless `declared_only`, its
/// bases) as seen through `instance`.
///
/// When `runtime` is a subtype of `declared`, virtual properties are reported
/// as the override the runtime type would dispatch to, bound to the
/// overriding type. Members shadowed by a more derived level are reported
/// once.
pub fn enumerate_members(
    client: &dyn DebuggeeClient,
    declared: &RemoteType,
    runtime: Option<&RemoteType>,
    instance: Option<&RemoteValue>,
    flags: BindingFlags,
) -> EvalResult<Vec<ValueReference>> {
    let overrides = match runtime {
        Some(runtime) if runtime != declared => collect_overrides(client, runtime, declared)?,
        _ => HashMap::new(),
    };
    let levels = if flags.declared_only {
        vec![declared.clone()]
    } else {
        base_chain(client, declared)?
    };

    let mut seen = HashSet::new();
    let mut members = Vec::new();
    for level in levels {
        if flags.just_my_code && level != *declared && client.is_external(level.id())? {
            continue;
        }

        for field in client.fields(level.id())? {
            if !flags.admits(field.is_static, field.visibility.is_public())
                || field.name.starts_with('<')
                || is_compiler_generated(&field.attributes)
                || !seen.insert(field.name.clone())
            {
                continue;
            }
            members.extend(bind_field(&field, instance));
        }

        for property in client.properties(level.id())? {
            if !property.has_plain_getter()
                || !flags.admits(property.is_static(), property.visibility().is_public())
                || !seen.insert(property.name.clone())
            {
                continue;
            }
            let property = match overrides.get(&property.name) {
                Some(over) if property.is_virtual() => over,
                _ => &property,
            };
            members.extend(bind_property(property, instance));
        }
    }
    Ok(members)
}

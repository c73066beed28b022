//! Reconstruction of source-level locals hoisted into compiler-generated
//! closure and iterator types.
//!
//! Compilers lower captured locals into fields of synthetic "display class"
//! or state-machine types. The original names survive in the field names, so
//! the logical scope can be rebuilt by walking those fields. Recognition is
//! driven entirely by the [`CompilerConventions`] table.

use std::collections::{HashSet, VecDeque};

use nova_remote::{DebuggeeClient, FieldInfo, RemoteValue};

use crate::{config::CompilerConventions, value_ref::FieldTarget, EvalResult, ValueReference};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratedKind {
    Closure,
    Iterator,
}

/// What a field of a generated type stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole<'a> {
    HoistedThis,
    /// Points at the enclosing closure instance.
    ClosureRef,
    /// Compiler bookkeeping (state, current value, ...).
    Internal,
    /// A hoisted source local; carries the undecorated name.
    HoistedLocal(&'a str),
    Plain,
}

#[derive(Clone, Debug)]
pub struct NamingConventions {
    families: Vec<CompilerConventions>,
}

impl Default for NamingConventions {
    fn default() -> Self {
        Self::new(CompilerConventions::defaults())
    }
}

impl NamingConventions {
    pub fn new(families: Vec<CompilerConventions>) -> Self {
        Self { families }
    }

    /// Classifies a type by its simple name.
    pub fn classify_type(&self, type_name: &str) -> Option<GeneratedKind> {
        let matches = |markers: &[String]| markers.iter().any(|m| type_name.contains(m.as_str()));
        if self.families.iter().any(|f| matches(&f.iterator_type_markers)) {
            Some(GeneratedKind::Iterator)
        } else if self.families.iter().any(|f| matches(&f.closure_type_markers)) {
            Some(GeneratedKind::Closure)
        } else {
            None
        }
    }

    pub fn field_role<'a>(&self, field_name: &'a str) -> FieldRole<'a> {
        if self
            .families
            .iter()
            .any(|f| f.hoisted_this_fields.iter().any(|n| n == field_name))
        {
            return FieldRole::HoistedThis;
        }
        if self.families.iter().any(|f| {
            f.closure_ref_prefixes
                .iter()
                .any(|p| field_name.starts_with(p.as_str()))
        }) {
            return FieldRole::ClosureRef;
        }
        if self.families.iter().any(|f| {
            !f.internal_marker.is_empty() && field_name.contains(f.internal_marker.as_str())
        }) {
            return FieldRole::Internal;
        }
        for family in &self.families {
            if let Some(name) = hoisted_local_name(family, field_name) {
                return FieldRole::HoistedLocal(name);
            }
        }
        FieldRole::Plain
    }

    /// Whether a local of an ordinary frame holds a closure instance that
    /// should be expanded instead of shown.
    pub fn is_closure_local(&self, local_name: &str, local_type_name: &str) -> bool {
        self.classify_type(local_type_name) == Some(GeneratedKind::Closure)
            && self.families.iter().any(|f| {
                f.closure_local_prefixes
                    .iter()
                    .any(|p| local_name.starts_with(p.as_str()))
            })
    }
}

fn hoisted_local_name<'a>(family: &CompilerConventions, field_name: &'a str) -> Option<&'a str> {
    if family.hoisted_local_open.is_empty() || family.hoisted_local_close.is_empty() {
        return None;
    }
    let rest = field_name.strip_prefix(family.hoisted_local_open.as_str())?;
    let end = rest.find(family.hoisted_local_close.as_str())?;
    let name = &rest[..end];
    (!name.is_empty()).then_some(name)
}

/// Walks generated closure/iterator instances to rebuild the logical scope.
///
/// The walk uses an explicit work queue, innermost instance first, so deeply
/// nested closures cannot exhaust the call stack.
pub struct ClosureReconstructor<'a> {
    client: &'a dyn DebuggeeClient,
    conventions: &'a NamingConventions,
}

impl<'a> ClosureReconstructor<'a> {
    pub fn new(client: &'a dyn DebuggeeClient, conventions: &'a NamingConventions) -> Self {
        Self {
            client,
            conventions,
        }
    }

    fn instance_fields(&self, instance: &RemoteValue) -> EvalResult<Vec<(FieldInfo, FieldTarget)>> {
        let Some(ty) = instance.remote_type() else {
            return Ok(Vec::new());
        };
        Ok(self
            .client
            .fields(ty.id())?
            .into_iter()
            .filter(|f| !f.is_static)
            .filter_map(|f| FieldTarget::for_field(&f, Some(instance)).map(|t| (f, t)))
            .collect())
    }

    fn read(&self, target: &FieldTarget, field: &FieldInfo) -> EvalResult<RemoteValue> {
        Ok(match target {
            FieldTarget::Object(object) => self.client.instance_field(*object, field.id)?,
            FieldTarget::Struct(s) => s.field(field.id).cloned().unwrap_or(RemoteValue::Null),
            FieldTarget::Static(_) => RemoteValue::Null,
        })
    }

    /// The locals captured by `this_value` and every closure it (transitively)
    /// references, flattened. Inner scopes shadow outer ones.
    ///
    /// Decorated hoisted locals are only reported inside iterators; plain,
    /// non-internal fields are reported under their own name.
    pub fn reconstruct_locals(
        &self,
        this_value: &RemoteValue,
        in_iterator: bool,
    ) -> EvalResult<Vec<ValueReference>> {
        let mut locals = Vec::new();
        let mut names = HashSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([this_value.clone()]);

        while let Some(instance) = queue.pop_front() {
            if let Some(id) = instance.object_id() {
                if !visited.insert(id) {
                    continue;
                }
            }
            for (field, target) in self.instance_fields(&instance)? {
                let name = match self.conventions.field_role(&field.name) {
                    FieldRole::HoistedThis | FieldRole::Internal => continue,
                    FieldRole::ClosureRef => {
                        let nested = self.read(&target, &field)?;
                        if nested != RemoteValue::Null {
                            queue.push_back(nested);
                        }
                        continue;
                    }
                    FieldRole::HoistedLocal(name) if in_iterator => name.to_string(),
                    FieldRole::HoistedLocal(_) => continue,
                    FieldRole::Plain => field.name.clone(),
                };
                if names.insert(name.clone()) {
                    locals.push(ValueReference::field(field, target).with_name(name));
                }
            }
        }
        Ok(locals)
    }

    /// The hoisted `this` reachable from `this_value`, named `this`.
    pub fn reconstruct_this(&self, this_value: &RemoteValue) -> EvalResult<Option<ValueReference>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([this_value.clone()]);

        while let Some(instance) = queue.pop_front() {
            if let Some(id) = instance.object_id() {
                if !visited.insert(id) {
                    continue;
                }
            }
            for (field, target) in self.instance_fields(&instance)? {
                match self.conventions.field_role(&field.name) {
                    FieldRole::HoistedThis => {
                        return Ok(Some(ValueReference::field(field, target).with_name("this")));
                    }
                    FieldRole::ClosureRef => {
                        let nested = self.read(&target, &field)?;
                        if nested != RemoteValue::Null {
                            queue.push_back(nested);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(None)
    }
}

//! Method overload resolution.
//!
//! Candidates are gathered along the declared type's base chain and ranked by
//! how many parameter types match the argument types exactly. Ties go to the
//! first maximal candidate found (most derived level first, declaration order
//! within a level); ambiguity is not reported.

use std::{collections::HashMap, sync::Arc};

use nova_remote::{ClientResult, DebuggeeClient, MethodInfo, RemoteType, TypeId};
use parking_lot::Mutex;

use crate::{
    hierarchy::{base_chain, is_assignable},
    EvalError, EvalResult, EvaluationContext,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MethodKey {
    ty: TypeId,
    name: String,
    ignore_case: bool,
}

type Bucket = Arc<Mutex<Option<Arc<[MethodInfo]>>>>;

/// Per-session cache of the methods a type declares under a name.
///
/// Method tables do not change while a type is loaded, so entries live until
/// the session is torn down. Each `(type, name)` bucket has its own lock: a
/// bucket is fetched from the debuggee once even when several threads ask for
/// it at the same time, while lookups of other buckets proceed.
#[derive(Debug, Default)]
pub struct MethodCache {
    buckets: Mutex<HashMap<MethodKey, Bucket>>,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods(
        &self,
        client: &dyn DebuggeeClient,
        ty: TypeId,
        name: &str,
        ignore_case: bool,
    ) -> ClientResult<Arc<[MethodInfo]>> {
        let key = MethodKey {
            ty,
            name: if ignore_case {
                name.to_ascii_lowercase()
            } else {
                name.to_string()
            },
            ignore_case,
        };
        let bucket = self.buckets.lock().entry(key).or_default().clone();

        let mut slot = bucket.lock();
        if let Some(methods) = slot.as_ref() {
            return Ok(methods.clone());
        }
        let methods: Arc<[MethodInfo]> = client.methods_by_name(ty, name, ignore_case)?.into();
        *slot = Some(methods.clone());
        Ok(methods)
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.buckets.lock().clear();
    }
}

/// One overload resolution request.
#[derive(Clone, Copy, Debug)]
pub struct OverloadQuery<'a> {
    pub name: &'a str,
    pub declared_type: &'a RemoteType,
    pub arg_types: &'a [RemoteType],
    pub allow_instance: bool,
    pub allow_static: bool,
    /// Report failures as errors instead of `Ok(None)`.
    pub throw_if_not_found: bool,
}

impl<'a> OverloadQuery<'a> {
    pub fn new(name: &'a str, declared_type: &'a RemoteType, arg_types: &'a [RemoteType]) -> Self {
        Self {
            name,
            declared_type,
            arg_types,
            allow_instance: true,
            allow_static: true,
            throw_if_not_found: true,
        }
    }

    fn fail(&self, err: EvalError) -> EvalResult<Option<MethodInfo>> {
        if self.throw_if_not_found {
            Err(err)
        } else {
            Ok(None)
        }
    }

    fn names(&self) -> (String, String) {
        (self.declared_type.full_name.clone(), self.name.to_string())
    }
}

struct Scorer<'c> {
    client: &'c dyn DebuggeeClient,
    types: HashMap<TypeId, RemoteType>,
}

impl<'c> Scorer<'c> {
    fn ty(&mut self, id: TypeId) -> ClientResult<RemoteType> {
        if let Some(ty) = self.types.get(&id) {
            return Ok(ty.clone());
        }
        let ty = self.client.type_info(id)?;
        self.types.insert(id, ty.clone());
        Ok(ty)
    }

    /// Number of exactly matching parameters, or `None` if some argument is
    /// not assignable to its parameter.
    fn score(
        &mut self,
        method: &MethodInfo,
        arg_types: &[RemoteType],
    ) -> ClientResult<Option<usize>> {
        let mut score = 0;
        for (param, arg) in method.parameters.iter().zip(arg_types) {
            let param_type = self.ty(param.ty)?;
            if param_type.full_name == arg.full_name {
                score += 1;
            } else if !is_assignable(self.client, &param_type, arg)? {
                return Ok(None);
            }
        }
        Ok(Some(score))
    }
}

fn gather_candidates(
    client: &dyn DebuggeeClient,
    cache: &MethodCache,
    ctx: &EvaluationContext,
    query: &OverloadQuery<'_>,
) -> EvalResult<Vec<MethodInfo>> {
    let ignore_case = !ctx.options.case_sensitive;
    let constructor = query.name == MethodInfo::CONSTRUCTOR;
    let mut candidates = Vec::new();
    for level in base_chain(client, query.declared_type)? {
        let methods = cache.methods(client, level.id(), query.name, ignore_case)?;
        candidates.extend(
            methods
                .iter()
                .filter(|m| m.parameters.len() == query.arg_types.len())
                .filter(|m| {
                    if m.is_static {
                        query.allow_static
                    } else {
                        query.allow_instance
                    }
                })
                .cloned(),
        );
        if constructor {
            break;
        }
    }
    Ok(candidates)
}

/// Picks the method `query.name` that best fits `query.arg_types`.
pub fn resolve_overload(
    client: &dyn DebuggeeClient,
    cache: &MethodCache,
    ctx: &EvaluationContext,
    query: &OverloadQuery<'_>,
) -> EvalResult<Option<MethodInfo>> {
    let candidates = gather_candidates(client, cache, ctx, query)?;
    let mut scorer = Scorer {
        client,
        types: HashMap::new(),
    };
    let (type_name, method) = query.names();

    match candidates.len() {
        0 => query.fail(EvalError::MethodNotFound { type_name, method }),
        1 => {
            let only = candidates.into_iter().next();
            match only {
                Some(m) if scorer.score(&m, query.arg_types)?.is_some() => Ok(Some(m)),
                _ => query.fail(EvalError::NoApplicableOverload { type_name, method }),
            }
        }
        _ => {
            let mut best: Option<(usize, MethodInfo)> = None;
            for candidate in candidates {
                let Some(score) = scorer.score(&candidate, query.arg_types)? else {
                    continue;
                };
                if best.as_ref().map_or(true, |(top, _)| score > *top) {
                    best = Some((score, candidate));
                }
            }
            match best {
                Some((_, m)) => Ok(Some(m)),
                None => query.fail(EvalError::InvalidArguments { type_name, method }),
            }
        }
    }
}

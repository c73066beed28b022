use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use nova_remote::{
    ClientError, DebuggeeClient, FrameId, InvokeTarget, LocalInfo, MethodInfo, RemoteType,
    RemoteValue, ThreadId, TypeId,
};
use parking_lot::Mutex;

use crate::{
    closures::{ClosureReconstructor, FieldRole, GeneratedKind, NamingConventions},
    coerce,
    config::EvalConfig,
    display::{extract_display_data, DisplayData},
    format,
    invoke::{InvocationState, MethodCall, ShutdownSignal},
    members::{enumerate_members, find_member, BindingFlags},
    overload::{resolve_overload, MethodCache, OverloadQuery},
    type_names,
    value_ref::invoke_target,
    EvalError, EvalOptions, EvalResult, EvaluationContext, StackVersion, ValueReference,
};

const INDEXER_GETTER: &str = "get_Item";

/// Entry point of the evaluation engine for one debug session.
///
/// Holds the session-scoped caches (method lists, display metadata) and the
/// shutdown signal that releases callers blocked on pending invocations.
pub struct EvalAdaptor {
    client: Arc<dyn DebuggeeClient>,
    config: EvalConfig,
    methods: MethodCache,
    conventions: NamingConventions,
    display_data: Mutex<HashMap<TypeId, Arc<DisplayData>>>,
    stack_version: StackVersion,
    shutdown: ShutdownSignal,
}

impl std::fmt::Debug for EvalAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalAdaptor")
            .field("config", &self.config)
            .field("cached_method_buckets", &self.methods.len())
            .finish_non_exhaustive()
    }
}

impl EvalAdaptor {
    pub fn new(client: Arc<dyn DebuggeeClient>, config: EvalConfig) -> Self {
        let conventions = NamingConventions::new(config.conventions.clone());
        Self {
            client,
            config,
            methods: MethodCache::new(),
            conventions,
            display_data: Mutex::new(HashMap::new()),
            stack_version: StackVersion::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn client(&self) -> &dyn DebuggeeClient {
        self.client.as_ref()
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn method_cache(&self) -> &MethodCache {
        &self.methods
    }

    pub fn conventions(&self) -> &NamingConventions {
        &self.conventions
    }

    /// A fresh context for `frame` with the configured default options.
    ///
    /// Every context shares the session's stack version, so a call made
    /// through one of them marks handles fetched through the others as stale.
    pub fn context(&self, thread: ThreadId, frame: FrameId) -> EvaluationContext {
        EvaluationContext::new(thread, frame, EvalOptions::from_config(&self.config))
            .with_stack_version(self.stack_version.clone())
    }

    pub fn stack_version(&self) -> &StackVersion {
        &self.stack_version
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Releases every caller waiting on an invocation. Pending calls stay
    /// pending in the debuggee.
    pub fn shutdown(&self) {
        tracing::debug!(target: "nova.eval", "evaluation engine shutting down");
        self.shutdown.trigger();
    }

    // Classification. Each predicate matches every shape explicitly.

    pub fn is_null(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::Null => true,
            RemoteValue::Primitive(_)
            | RemoteValue::String { .. }
            | RemoteValue::Array { .. }
            | RemoteValue::Struct(_)
            | RemoteValue::Object { .. }
            | RemoteValue::Enum { .. } => false,
        }
    }

    pub fn is_primitive(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::Primitive(_) => true,
            RemoteValue::Null
            | RemoteValue::String { .. }
            | RemoteValue::Array { .. }
            | RemoteValue::Struct(_)
            | RemoteValue::Object { .. }
            | RemoteValue::Enum { .. } => false,
        }
    }

    pub fn is_string(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::String { .. } => true,
            RemoteValue::Null
            | RemoteValue::Primitive(_)
            | RemoteValue::Array { .. }
            | RemoteValue::Struct(_)
            | RemoteValue::Object { .. }
            | RemoteValue::Enum { .. } => false,
        }
    }

    pub fn is_array(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::Array { .. } => true,
            RemoteValue::Null
            | RemoteValue::Primitive(_)
            | RemoteValue::String { .. }
            | RemoteValue::Struct(_)
            | RemoteValue::Object { .. }
            | RemoteValue::Enum { .. } => false,
        }
    }

    pub fn is_enum(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::Enum { .. } => true,
            RemoteValue::Null
            | RemoteValue::Primitive(_)
            | RemoteValue::String { .. }
            | RemoteValue::Array { .. }
            | RemoteValue::Struct(_)
            | RemoteValue::Object { .. } => false,
        }
    }

    /// Class or struct instance, i.e. a value with members.
    pub fn is_class(&self, value: &RemoteValue) -> bool {
        match value {
            RemoteValue::Struct(_) | RemoteValue::Object { .. } => true,
            RemoteValue::Null
            | RemoteValue::Primitive(_)
            | RemoteValue::String { .. }
            | RemoteValue::Array { .. }
            | RemoteValue::Enum { .. } => false,
        }
    }

    // Members and variables.

    pub fn member(
        &self,
        ctx: &EvaluationContext,
        ty: &RemoteType,
        instance: Option<&RemoteValue>,
        name: &str,
    ) -> EvalResult<Option<ValueReference>> {
        find_member(self.client(), ctx, ty, instance, name)
    }

    /// Members of `declared` as seen through `instance`, whose runtime type
    /// decides which virtual property overrides are reported.
    pub fn members(
        &self,
        declared: &RemoteType,
        instance: Option<&RemoteValue>,
        flags: BindingFlags,
    ) -> EvalResult<Vec<ValueReference>> {
        let runtime = instance.and_then(RemoteValue::remote_type);
        enumerate_members(self.client(), declared, runtime, instance, flags)
    }

    fn frame_slots(&self, ctx: &EvaluationContext) -> EvalResult<Vec<LocalInfo>> {
        match self.client.frame_locals(ctx.frame) {
            Ok(slots) => Ok(slots),
            Err(ClientError::AbsentInformation) => {
                tracing::debug!(
                    target: "nova.eval",
                    frame = %ctx.frame,
                    "no local information for frame"
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn frame_this(&self, ctx: &EvaluationContext) -> EvalResult<RemoteValue> {
        match self.client.frame_this(ctx.thread, ctx.frame) {
            Ok(value) => Ok(value),
            Err(ClientError::AbsentInformation) => Ok(RemoteValue::Null),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the frame executes inside a compiler generated closure or
    /// iterator type.
    fn frame_kind(&self, ctx: &EvaluationContext) -> EvalResult<Option<GeneratedKind>> {
        let method = self.client.frame_method(ctx.frame)?;
        let declaring = self.client.type_info(method.declaring_type)?;
        Ok(self.conventions.classify_type(&declaring.name))
    }

    fn slot_name(&self, ctx: &EvaluationContext, slot: &LocalInfo) -> Option<String> {
        match &slot.name {
            Some(name) => Some(name.clone()),
            None if !ctx.source_available => Some(synthetic_name(slot)),
            None => None,
        }
    }

    /// The locals visible at the frame, with hoisted closure and iterator
    /// variables shown under their source names.
    pub fn local_variables(&self, ctx: &EvaluationContext) -> EvalResult<Vec<ValueReference>> {
        let reconstructor = ClosureReconstructor::new(self.client(), &self.conventions);
        let mut seen = HashSet::new();
        let mut locals = Vec::new();
        let mut push = |locals: &mut Vec<ValueReference>, reference: ValueReference| {
            if seen.insert(reference.name().to_string()) {
                locals.push(reference);
            }
        };

        for slot in self.frame_slots(ctx)? {
            if slot.is_argument {
                continue;
            }
            let Some(name) = self.slot_name(ctx, &slot) else {
                continue;
            };
            let slot_type = self.client.type_info(slot.ty)?;
            if self.conventions.is_closure_local(&name, &slot_type.name) {
                let closure = self.client.local_value(ctx.frame, &slot)?;
                if closure != RemoteValue::Null {
                    for hoisted in reconstructor.reconstruct_locals(&closure, false)? {
                        push(&mut locals, hoisted);
                    }
                }
                continue;
            }
            if self.conventions.field_role(&name) == FieldRole::Internal {
                continue;
            }
            push(&mut locals, ValueReference::local(ctx.frame, slot, name));
        }

        if let Some(kind) = self.frame_kind(ctx)? {
            let this = self.frame_this(ctx)?;
            if this != RemoteValue::Null {
                let in_iterator = kind == GeneratedKind::Iterator;
                for hoisted in reconstructor.reconstruct_locals(&this, in_iterator)? {
                    push(&mut locals, hoisted);
                }
            }
        }
        Ok(locals)
    }

    pub fn parameters(&self, ctx: &EvaluationContext) -> EvalResult<Vec<ValueReference>> {
        Ok(self
            .frame_slots(ctx)?
            .into_iter()
            .filter(|slot| slot.is_argument)
            .filter_map(|slot| {
                let name = self.slot_name(ctx, &slot)?;
                Some(ValueReference::local(ctx.frame, slot, name))
            })
            .collect())
    }

    pub fn local_variable(
        &self,
        ctx: &EvaluationContext,
        name: &str,
    ) -> EvalResult<Option<ValueReference>> {
        if let Some(found) = self
            .local_variables(ctx)?
            .into_iter()
            .find(|l| ctx.names_match(l.name(), name))
        {
            return Ok(Some(found));
        }
        self.synthetic_slot(ctx, name, false)
    }

    pub fn parameter(
        &self,
        ctx: &EvaluationContext,
        name: &str,
    ) -> EvalResult<Option<ValueReference>> {
        if let Some(found) = self
            .parameters(ctx)?
            .into_iter()
            .find(|p| ctx.names_match(p.name(), name))
        {
            return Ok(Some(found));
        }
        self.synthetic_slot(ctx, name, true)
    }

    /// `loc3`/`arg1` style lookups when the frame has source information and
    /// therefore does not list synthetic names.
    fn synthetic_slot(
        &self,
        ctx: &EvaluationContext,
        name: &str,
        argument: bool,
    ) -> EvalResult<Option<ValueReference>> {
        if !ctx.source_available {
            return Ok(None);
        }
        let prefix = if argument { "arg" } else { "loc" };
        let Some(index) = name
            .strip_prefix(prefix)
            .and_then(|digits| digits.parse::<u32>().ok())
        else {
            return Ok(None);
        };
        Ok(self
            .frame_slots(ctx)?
            .into_iter()
            .find(|slot| slot.is_argument == argument && slot.index == index)
            .map(|slot| ValueReference::local(ctx.frame, slot, name)))
    }

    /// `this` of the frame; inside generated closures and iterators, the
    /// captured `this` of the enclosing method.
    pub fn this_reference(&self, ctx: &EvaluationContext) -> EvalResult<Option<ValueReference>> {
        let this = self.frame_this(ctx)?;
        if this == RemoteValue::Null {
            return Ok(None);
        }
        if self.frame_kind(ctx)?.is_some() {
            let reconstructor = ClosureReconstructor::new(self.client(), &self.conventions);
            return reconstructor.reconstruct_this(&this);
        }
        Ok(Some(ValueReference::this(this)))
    }

    pub fn current_exception(&self, ctx: &EvaluationContext) -> EvalResult<Option<ValueReference>> {
        Ok(self
            .client
            .current_exception(ctx.thread)?
            .map(|exception| {
                ValueReference::exception(ctx.thread, exception.remote_type().map(RemoteType::id))
            }))
    }

    pub fn array_element(&self, array: &RemoteValue, index: usize) -> EvalResult<ValueReference> {
        let RemoteValue::Array { object, ty } = array else {
            return Err(EvalError::NotSupported(
                "element access requires an array".to_string(),
            ));
        };
        let length = self.client.array_length(*object)?;
        if index >= length {
            return Err(EvalError::IndexOutOfRange { index, length });
        }
        Ok(ValueReference::array_element(*object, index, ty.element_type))
    }

    /// `instance[index...]` through the indexer whose parameters best fit
    /// `index_types`. The accessors only run when the reference is read or
    /// written.
    pub fn indexer_element(
        &self,
        ctx: &EvaluationContext,
        instance: &RemoteValue,
        index_types: &[RemoteType],
        index: Vec<RemoteValue>,
    ) -> EvalResult<ValueReference> {
        let ty = instance.remote_type().ok_or_else(|| {
            EvalError::NotSupported("indexing requires an object or struct".to_string())
        })?;
        let query = OverloadQuery {
            allow_static: false,
            ..OverloadQuery::new(INDEXER_GETTER, ty, index_types)
        };
        let getter = self
            .resolve_method(ctx, &query)?
            .ok_or_else(|| EvalError::MethodNotFound {
                type_name: ty.full_name.clone(),
                method: INDEXER_GETTER.to_string(),
            })?;
        let property = self
            .client
            .properties(getter.declaring_type)?
            .into_iter()
            .find(|p| p.getter.as_ref().is_some_and(|g| g.id == getter.id))
            .ok_or_else(|| EvalError::NotSupported(format!("`{}` has no indexer", ty.full_name)))?;
        let target = invoke_target(getter.declaring_type, false, Some(instance)).ok_or_else(
            || EvalError::NotSupported("indexing requires an object or struct".to_string()),
        )?;

        let quiet = EvaluationContext {
            options: ctx.options.side_effect_free(),
            ..ctx.clone()
        };
        let labels = index
            .iter()
            .map(|v| self.value_to_string(&quiet, v))
            .collect::<EvalResult<Vec<_>>>()?;
        let name = format!("[{}]", labels.join(", "));
        Ok(ValueReference::indexer_element(property, target, index, name))
    }

    // Types.

    pub fn resolve_type(
        &self,
        name: &str,
        generic_args: &[RemoteType],
    ) -> EvalResult<Option<RemoteType>> {
        Ok(type_names::resolve_type(self.client(), name, generic_args)?)
    }

    pub fn namespaces(&self, ctx: &EvaluationContext, prefix: &str) -> EvalResult<Vec<String>> {
        type_names::namespaces(self.client(), ctx, prefix)
    }

    pub fn types_in_namespace(
        &self,
        ctx: &EvaluationContext,
        namespace: &str,
    ) -> EvalResult<Vec<RemoteType>> {
        type_names::types_in_namespace(self.client(), ctx, namespace)
    }

    pub fn nested_types(&self, ty: &RemoteType) -> EvalResult<Vec<RemoteType>> {
        Ok(self.client.nested_types(ty.id())?)
    }

    pub fn display_type_name(&self, ty: &RemoteType) -> EvalResult<String> {
        Ok(type_names::display_type_name(self.client(), ty)?)
    }

    pub fn is_external_type(&self, ty: &RemoteType) -> EvalResult<bool> {
        Ok(self.client.is_external(ty.id())?)
    }

    /// Display metadata of `ty`, read once per session.
    pub fn type_display_data(&self, ty: &RemoteType) -> Arc<DisplayData> {
        if let Some(data) = self.display_data.lock().get(&ty.id()) {
            return data.clone();
        }
        let data = Arc::new(extract_display_data(self.client(), ty));
        self.display_data
            .lock()
            .entry(ty.id())
            .or_insert(data)
            .clone()
    }

    // Methods and invocation.

    pub fn methods_named(&self, ty: &RemoteType, name: &str) -> EvalResult<Arc<[MethodInfo]>> {
        Ok(self.methods.methods(self.client(), ty.id(), name, false)?)
    }

    pub fn resolve_method(
        &self,
        ctx: &EvaluationContext,
        query: &OverloadQuery<'_>,
    ) -> EvalResult<Option<MethodInfo>> {
        resolve_overload(self.client(), &self.methods, ctx, query)
    }

    /// Resolves `name` against `arg_types` and calls it on `instance` (or
    /// statically when `instance` is `None`).
    pub fn invoke(
        &self,
        ctx: &EvaluationContext,
        declared_type: &RemoteType,
        instance: Option<&RemoteValue>,
        name: &str,
        arg_types: &[RemoteType],
        args: Vec<RemoteValue>,
    ) -> EvalResult<RemoteValue> {
        if !ctx.options.allow_target_invoke {
            return Err(EvalError::InvocationDisabled);
        }
        let query = OverloadQuery {
            allow_instance: instance.is_some(),
            ..OverloadQuery::new(name, declared_type, arg_types)
        };
        let method = self.resolve_method(ctx, &query)?.ok_or_else(|| {
            EvalError::MethodNotFound {
                type_name: declared_type.full_name.clone(),
                method: name.to_string(),
            }
        })?;
        let target = invoke_target(method.declaring_type, method.is_static, instance)
            .ok_or_else(|| {
                EvalError::NotSupported(format!("`{name}` cannot be called on this value"))
            })?;
        self.invoke_method(ctx, target, &method, args)
    }

    /// Runs the constructor of `ty` best matching `arg_types`.
    pub fn create_instance(
        &self,
        ctx: &EvaluationContext,
        ty: &RemoteType,
        arg_types: &[RemoteType],
        args: Vec<RemoteValue>,
    ) -> EvalResult<RemoteValue> {
        if !ctx.options.allow_target_invoke {
            return Err(EvalError::InvocationDisabled);
        }
        let query = OverloadQuery {
            allow_static: false,
            ..OverloadQuery::new(MethodInfo::CONSTRUCTOR, ty, arg_types)
        };
        let ctor = self.resolve_method(ctx, &query)?.ok_or_else(|| EvalError::MethodNotFound {
            type_name: ty.full_name.clone(),
            method: MethodInfo::CONSTRUCTOR.to_string(),
        })?;
        self.invoke_method(ctx, InvokeTarget::Type(ty.id()), &ctor, args)
    }

    /// Starts a call without waiting for it.
    pub fn start_call(
        &self,
        ctx: &EvaluationContext,
        target: InvokeTarget,
        method: &MethodInfo,
        args: Vec<RemoteValue>,
    ) -> EvalResult<Arc<MethodCall>> {
        let call = Arc::new(MethodCall::new(
            self.client.clone(),
            ctx.thread,
            target,
            method.clone(),
            args,
            ctx.stack_version.clone(),
            self.shutdown.clone(),
        ));
        call.invoke()?;
        Ok(call)
    }

    /// Calls `method` and waits for its result.
    ///
    /// A call still running after the evaluation timeout is aborted; if it
    /// does not finish within the abort grace period either, the evaluation
    /// fails with [`EvalError::Timeout`] and the call is left to the session.
    pub fn invoke_method(
        &self,
        ctx: &EvaluationContext,
        target: InvokeTarget,
        method: &MethodInfo,
        args: Vec<RemoteValue>,
    ) -> EvalResult<RemoteValue> {
        if !ctx.options.allow_target_invoke {
            return Err(EvalError::InvocationDisabled);
        }
        let call = self.start_call(ctx, target, method, args)?;

        if call.wait_for_completed(self.config.evaluation_timeout()) {
            return self.outcome(&call);
        }

        tracing::debug!(
            target: "nova.eval",
            method = %method.name,
            timeout_ms = self.config.evaluation_timeout_ms,
            "evaluation timed out; aborting invocation"
        );
        call.abort()?;
        if call.wait_for_completed(self.config.abort_grace()) {
            return match self.outcome(&call) {
                Err(EvalError::Aborted) => Err(EvalError::Timeout),
                other => other,
            };
        }
        Err(EvalError::Timeout)
    }

    fn outcome(&self, call: &MethodCall) -> EvalResult<RemoteValue> {
        if call.state() == InvocationState::Invoking {
            // Shutdown won the race.
            return Err(EvalError::Cancelled);
        }
        call.take_result().unwrap_or(Err(EvalError::Cancelled))
    }

    // Values.

    pub fn value_to_string(
        &self,
        ctx: &EvaluationContext,
        value: &RemoteValue,
    ) -> EvalResult<String> {
        format::value_to_string(self, ctx, value)
    }

    pub fn try_cast(
        &self,
        value: &RemoteValue,
        ty: &RemoteType,
    ) -> EvalResult<Option<RemoteValue>> {
        coerce::try_cast(self, value, ty)
    }

    pub fn try_convert(
        &self,
        ctx: &EvaluationContext,
        value: &RemoteValue,
        ty: &RemoteType,
    ) -> EvalResult<Option<RemoteValue>> {
        coerce::try_convert(self, ctx, value, ty)
    }

    pub fn create_string(&self, value: &str) -> EvalResult<RemoteValue> {
        Ok(self.client.create_string(value)?)
    }
}

fn synthetic_name(slot: &LocalInfo) -> String {
    if slot.is_argument {
        format!("arg{}", slot.index)
    } else {
        format!("loc{}", slot.index)
    }
}

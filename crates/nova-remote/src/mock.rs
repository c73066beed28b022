use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::Sender;

use crate::{
    poison::lock, ClientError, ClientResult, CustomAttribute, DebuggeeClient, FieldId, FieldInfo,
    FrameId, InvokeId, InvokeOptions, InvokeOutcome, InvokeTarget, LocalInfo, MethodId,
    MethodInfo, ModuleId, ObjectId, ParameterInfo, PendingInvoke, PrimitiveValue, PropertyId,
    PropertyInfo, RemoteType, RemoteValue, StructValue, ThreadId, TypeFlags, TypeId, TypeInfo,
    Visibility,
};

const CORE_ASSEMBLY: &str = "mscorlib";
const USER_ASSEMBLY: &str = "App";
const MOCK_MODULE: ModuleId = ModuleId(1);

/// How a mocked method behaves when it is invoked.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodBehavior {
    Return(RemoteValue),
    /// Returns the receiver's field (handy for property getters).
    ReturnField(FieldId),
    /// Allocates a fresh instance of the method's declaring type.
    Construct,
    Throw(RemoteValue),
    /// The call is accepted but only finishes when the test calls
    /// [`MockDebuggee::complete_invoke`] (returning the value) or aborts it.
    Hang(RemoteValue),
    FailBegin(ClientError),
    FailEnd(ClientError),
}

#[derive(Clone, Debug)]
pub struct MockFrame {
    pub method: MethodInfo,
    pub this: RemoteValue,
    pub locals: Vec<(LocalInfo, RemoteValue)>,
    /// Simulates a frame without debug information.
    pub absent_information: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedInvoke {
    pub id: InvokeId,
    pub thread: ThreadId,
    pub target: InvokeTarget,
    pub method: MethodId,
    pub args: Vec<RemoteValue>,
    pub options: InvokeOptions,
}

/// Protocol calls observed by the mock, for assertions.
#[derive(Clone, Debug, Default)]
pub struct MockCalls {
    pub begin_invoke: Vec<RecordedInvoke>,
    pub end_invoke: Vec<InvokeId>,
    pub abort_invoke: Vec<InvokeId>,
    pub methods_by_name: Vec<(TypeId, String)>,
    pub force_load: Vec<String>,
}

#[derive(Debug)]
struct MockType {
    info: RemoteType,
    fields: Vec<FieldInfo>,
    properties: Vec<PropertyInfo>,
    methods: Vec<MethodInfo>,
    nested: Vec<TypeId>,
    interfaces: Vec<TypeId>,
    attributes: Vec<CustomAttribute>,
    external: bool,
    indexed: bool,
    loaded: bool,
}

#[derive(Debug)]
enum ObjectKind {
    Plain(HashMap<FieldId, RemoteValue>),
    Str(String),
    Array(Vec<RemoteValue>),
}

#[derive(Debug)]
struct MockObject {
    ty: TypeId,
    kind: ObjectKind,
}

#[derive(Debug)]
struct PendingCall {
    /// Kept until the call is ended, so completion arrives as one message
    /// rather than a disconnect.
    signal: Sender<()>,
    finished: bool,
    result: ClientResult<InvokeOutcome>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    types: HashMap<TypeId, MockType>,
    order: Vec<TypeId>,
    objects: HashMap<ObjectId, MockObject>,
    statics: HashMap<FieldId, RemoteValue>,
    behaviors: HashMap<MethodId, MethodBehavior>,
    frames: HashMap<FrameId, MockFrame>,
    exceptions: HashMap<ThreadId, RemoteValue>,
    pending: HashMap<InvokeId, PendingCall>,
    calls: MockCalls,
    fail_attributes: bool,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn ty(&self, id: TypeId) -> ClientResult<&MockType> {
        self.types
            .get(&id)
            .filter(|t| t.loaded)
            .ok_or_else(|| ClientError::InvalidHandle(id.to_string()))
    }

    fn type_by_name(&self, full_name: &str) -> Option<&MockType> {
        self.order
            .iter()
            .filter_map(|id| self.types.get(id))
            .find(|t| t.info.full_name == full_name)
    }

    fn insert_type(
        &mut self,
        configure: impl FnOnce(&mut TypeInfo),
        full_name: &str,
    ) -> RemoteType {
        let id = TypeId(self.next());
        let (namespace, name) = split_full_name(full_name);
        let generic_arity = name
            .rsplit_once('`')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(0);
        let mut info = TypeInfo {
            id,
            name: name.to_string(),
            full_name: full_name.to_string(),
            namespace: namespace.to_string(),
            assembly: USER_ASSEMBLY.to_string(),
            base: None,
            declaring_type: None,
            element_type: None,
            generic_arity,
            generic_arguments: Vec::new(),
            flags: TypeFlags::default(),
        };
        configure(&mut info);
        let declaring = info.declaring_type;
        let ty = RemoteType::new(info);
        self.types.insert(
            id,
            MockType {
                info: ty.clone(),
                fields: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                nested: Vec::new(),
                interfaces: Vec::new(),
                attributes: Vec::new(),
                external: false,
                indexed: true,
                loaded: true,
            },
        );
        self.order.push(id);
        if let Some(outer) = declaring.and_then(|d| self.types.get_mut(&d)) {
            outer.nested.push(id);
        }
        ty
    }

    fn insert_field(&mut self, field: FieldInfo) {
        if let Some(t) = self.types.get_mut(&field.declaring_type) {
            t.fields.push(field);
        }
    }

    fn insert_method(&mut self, method: MethodInfo, behavior: MethodBehavior) {
        self.behaviors.insert(method.id, behavior);
        if let Some(t) = self.types.get_mut(&method.declaring_type) {
            t.methods.push(method);
        }
    }

    fn new_method(
        &mut self,
        ty: &RemoteType,
        name: &str,
        params: &[&RemoteType],
        returns: Option<&RemoteType>,
    ) -> MethodInfo {
        MethodInfo {
            id: MethodId(self.next()),
            name: name.to_string(),
            declaring_type: ty.id(),
            parameters: params
                .iter()
                .enumerate()
                .map(|(i, p)| ParameterInfo {
                    name: format!("p{i}"),
                    ty: p.id(),
                })
                .collect(),
            return_type: returns.map(RemoteType::id),
            is_static: false,
            is_virtual: false,
            visibility: Visibility::Public,
        }
    }

    fn alloc(&mut self, ty: TypeId, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next());
        self.objects.insert(id, MockObject { ty, kind });
        id
    }

    fn method_owner(&self, method: MethodId) -> Option<TypeId> {
        self.types
            .values()
            .find(|t| t.methods.iter().any(|m| m.id == method))
            .map(|t| t.info.id())
    }

    /// Whether `ty` is `ancestor`, derives from it or implements it.
    fn derives_from(&self, ty: TypeId, ancestor: TypeId) -> bool {
        let mut stack = vec![ty];
        let mut seen = Vec::new();
        while let Some(next) = stack.pop() {
            if next == ancestor {
                return true;
            }
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            if let Some(t) = self.types.get(&next) {
                stack.extend(t.info.base);
                stack.extend(t.interfaces.iter().copied());
            }
        }
        false
    }

    /// Rejects instance calls whose receiver does not have the method.
    fn check_receiver(&self, target: &InvokeTarget, method: MethodId) -> ClientResult<()> {
        let InvokeTarget::Object(object) = target else {
            return Ok(());
        };
        let runtime = self
            .objects
            .get(object)
            .map(|o| o.ty)
            .ok_or(ClientError::InvalidObject(*object))?;
        match self.method_owner(method) {
            Some(owner) if self.derives_from(runtime, owner) => Ok(()),
            _ => Err(ClientError::InvalidHandle(format!(
                "{method} is not defined on the type of {object}"
            ))),
        }
    }

    fn object_field(&self, object: ObjectId, field: FieldId) -> ClientResult<RemoteValue> {
        match self.objects.get(&object) {
            Some(MockObject {
                kind: ObjectKind::Plain(fields),
                ..
            }) => Ok(fields.get(&field).cloned().unwrap_or(RemoteValue::Null)),
            Some(_) => Err(ClientError::InvalidHandle(field.to_string())),
            None => Err(ClientError::InvalidObject(object)),
        }
    }

    fn run_method(
        &mut self,
        target: &InvokeTarget,
        method: MethodId,
        behavior: MethodBehavior,
    ) -> ClientResult<InvokeOutcome> {
        match behavior {
            MethodBehavior::Return(v) | MethodBehavior::Hang(v) => Ok(InvokeOutcome::Returned(v)),
            MethodBehavior::Throw(v) => Ok(InvokeOutcome::Thrown(v)),
            MethodBehavior::FailEnd(err) | MethodBehavior::FailBegin(err) => Err(err),
            MethodBehavior::ReturnField(field) => match target {
                InvokeTarget::Object(object) => {
                    self.object_field(*object, field).map(InvokeOutcome::Returned)
                }
                InvokeTarget::Struct(s) => Ok(InvokeOutcome::Returned(
                    s.field(field).cloned().unwrap_or(RemoteValue::Null),
                )),
                InvokeTarget::Type(_) => Ok(InvokeOutcome::Returned(
                    self.statics.get(&field).cloned().unwrap_or(RemoteValue::Null),
                )),
            },
            MethodBehavior::Construct => {
                let declaring = self
                    .method_owner(method)
                    .and_then(|id| self.types.get(&id))
                    .map(|t| t.info.clone())
                    .ok_or_else(|| ClientError::InvalidHandle(method.to_string()))?;
                let object = self.alloc(declaring.id(), ObjectKind::Plain(HashMap::new()));
                Ok(InvokeOutcome::Returned(RemoteValue::Object {
                    object,
                    ty: declaring,
                }))
            }
        }
    }
}

fn split_full_name(full_name: &str) -> (&str, &str) {
    let definition = if full_name.ends_with("[]") {
        full_name
    } else {
        full_name.split('[').next().unwrap_or(full_name)
    };
    let outer = definition.split('+').next().unwrap_or(definition);
    let namespace = outer.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("");
    let name = definition
        .rsplit(['.', '+'])
        .next()
        .unwrap_or(definition);
    (namespace, name)
}

/// Deterministic, in-memory debuggee test double.
///
/// Comes preloaded with the core library types (`System.Object`,
/// `System.String`, the primitive types, `System.Exception`, ...) so tests
/// only need to declare their own fixtures.
#[derive(Debug)]
pub struct MockDebuggee {
    state: Mutex<State>,
}

impl Default for MockDebuggee {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDebuggee {
    pub const PRIMITIVES: [&'static str; 12] = [
        "System.Boolean",
        "System.Char",
        "System.SByte",
        "System.Byte",
        "System.Int16",
        "System.UInt16",
        "System.Int32",
        "System.UInt32",
        "System.Int64",
        "System.UInt64",
        "System.Single",
        "System.Double",
    ];

    pub fn new() -> Self {
        let mock = Self {
            state: Mutex::new(State::default()),
        };
        mock.install_core_types();
        mock
    }

    fn install_core_types(&self) {
        let core = |info: &mut TypeInfo| info.assembly = CORE_ASSEMBLY.to_string();
        let object = self.add_type_with("System.Object", core);
        let value_type = self.add_type_with("System.ValueType", |i| {
            core(i);
            i.base = Some(object.id());
        });
        self.add_type_with("System.Enum", |i| {
            core(i);
            i.base = Some(value_type.id());
        });
        let string = self.add_type_with("System.String", |i| {
            core(i);
            i.base = Some(object.id());
        });
        self.add_type_with("System.Array", |i| {
            core(i);
            i.base = Some(object.id());
        });
        for name in Self::PRIMITIVES {
            let prim = self.add_type_with(name, |i| {
                core(i);
                i.base = Some(value_type.id());
                i.flags.value_type = true;
                i.flags.primitive = true;
            });
            self.add_field(&prim, "m_value", &prim, false);
        }

        let to_string = self.add_method_with(&object, "ToString", &[], Some(&string), |m| {
            m.is_virtual = true;
        });
        self.set_behavior(&to_string, MethodBehavior::Return(RemoteValue::Null));

        let exception = self.add_type_with("System.Exception", |i| {
            core(i);
            i.base = Some(object.id());
        });
        let message = self.add_field_with(&exception, "_message", &string, |f| {
            f.visibility = Visibility::Private;
        });
        self.add_property_with(
            &exception,
            "Message",
            &string,
            MethodBehavior::ReturnField(message.id),
            |g| g.is_virtual = true,
        );
        for ty in self.all_types().unwrap_or_default() {
            self.set_external(&ty, true);
        }
    }

    /// Registers a loaded type named `full_name`; `configure` can adjust
    /// flags, base type, assembly and generic arguments.
    pub fn add_type_with(
        &self,
        full_name: &str,
        configure: impl FnOnce(&mut TypeInfo),
    ) -> RemoteType {
        lock(&self.state, "add_type").insert_type(configure, full_name)
    }

    pub fn add_class(&self, full_name: &str, base: Option<&RemoteType>) -> RemoteType {
        let base = match base {
            Some(b) => b.id(),
            None => self.core("System.Object").id(),
        };
        self.add_type_with(full_name, |i| i.base = Some(base))
    }

    pub fn add_interface(&self, full_name: &str) -> RemoteType {
        self.add_type_with(full_name, |i| i.flags.interface = true)
    }

    /// Declares that `ty` implements `interface`.
    pub fn implement(&self, ty: &RemoteType, interface: &RemoteType) {
        if let Some(t) = lock(&self.state, "implement").types.get_mut(&ty.id()) {
            t.interfaces.push(interface.id());
        }
    }

    pub fn add_struct(&self, full_name: &str) -> RemoteType {
        let base = self.core("System.ValueType").id();
        self.add_type_with(full_name, |i| {
            i.base = Some(base);
            i.flags.value_type = true;
        })
    }

    /// Declares an enum with `System.Int32` underlying values.
    pub fn add_enum(&self, full_name: &str, members: &[(&str, i32)]) -> RemoteType {
        let base = self.core("System.Enum").id();
        let ty = self.add_type_with(full_name, |i| {
            i.base = Some(base);
            i.flags.value_type = true;
            i.flags.enum_type = true;
        });
        let int = self.core("System.Int32");
        self.add_field(&ty, "value__", &int, false);
        for (name, value) in members {
            let field = self.add_field_with(&ty, name, &ty, |f| {
                f.is_static = true;
                f.is_literal = true;
            });
            self.set_static(
                &field,
                RemoteValue::Enum {
                    ty: ty.clone(),
                    value: PrimitiveValue::I32(*value),
                },
            );
        }
        ty
    }

    /// Registers a closed generic instantiation of `definition` (e.g.
    /// ``System.Collections.Generic.List`1``).
    pub fn add_generic_instance(&self, definition: &str, args: &[&RemoteType]) -> RemoteType {
        let suffix = args
            .iter()
            .map(|a| format!("[{}]", a.qualified_name()))
            .collect::<Vec<_>>()
            .join(",");
        let arg_ids: Vec<TypeId> = args.iter().map(|a| a.id()).collect();
        let base = self.core("System.Object").id();
        self.add_type_with(&format!("{definition}[{suffix}]"), |i| {
            i.base = Some(base);
            i.generic_arguments = arg_ids;
        })
    }

    /// The `T[]` array type, registered on first use.
    pub fn array_type(&self, element: &RemoteType) -> RemoteType {
        let name = format!("{}[]", element.full_name);
        if let Some(existing) = self.type_named(&name) {
            return existing;
        }
        let base = self.core("System.Array").id();
        let element_id = element.id();
        let assembly = element.assembly.clone();
        self.add_type_with(&name, |i| {
            i.base = Some(base);
            i.element_type = Some(element_id);
            i.flags.array = true;
            i.assembly = assembly;
        })
    }

    /// Any registered type (loaded or not) with the given full name.
    pub fn type_named(&self, full_name: &str) -> Option<RemoteType> {
        lock(&self.state, "type_named")
            .type_by_name(full_name)
            .map(|t| t.info.clone())
    }

    fn core(&self, full_name: &str) -> RemoteType {
        self.type_named(full_name).unwrap_or_else(|| {
            self.add_type_with(full_name, |i| i.assembly = CORE_ASSEMBLY.to_string())
        })
    }

    /// Keeps the type out of the global type index; it can still be found by
    /// searching modules.
    pub fn hide_from_global_index(&self, ty: &RemoteType) {
        if let Some(t) = lock(&self.state, "hide").types.get_mut(&ty.id()) {
            t.indexed = false;
        }
    }

    /// Marks the type as present in the target but not loaded yet.
    pub fn mark_unloaded(&self, ty: &RemoteType) {
        if let Some(t) = lock(&self.state, "unload").types.get_mut(&ty.id()) {
            t.loaded = false;
        }
    }

    pub fn set_external(&self, ty: &RemoteType, external: bool) {
        if let Some(t) = lock(&self.state, "set_external").types.get_mut(&ty.id()) {
            t.external = external;
        }
    }

    pub fn add_attribute(&self, ty: &RemoteType, attribute: CustomAttribute) {
        if let Some(t) = lock(&self.state, "add_attribute").types.get_mut(&ty.id()) {
            t.attributes.push(attribute);
        }
    }

    /// Makes every subsequent custom attribute query fail.
    pub fn fail_custom_attributes(&self, fail: bool) {
        lock(&self.state, "fail_attributes").fail_attributes = fail;
    }

    pub fn add_field(
        &self,
        ty: &RemoteType,
        name: &str,
        field_type: &RemoteType,
        is_static: bool,
    ) -> FieldInfo {
        self.add_field_with(ty, name, field_type, |f| f.is_static = is_static)
    }

    pub fn add_field_with(
        &self,
        ty: &RemoteType,
        name: &str,
        field_type: &RemoteType,
        configure: impl FnOnce(&mut FieldInfo),
    ) -> FieldInfo {
        let mut state = lock(&self.state, "add_field");
        let mut field = FieldInfo {
            id: FieldId(state.next()),
            name: name.to_string(),
            declaring_type: ty.id(),
            field_type: field_type.id(),
            is_static: false,
            is_literal: false,
            visibility: Visibility::Public,
            attributes: Vec::new(),
        };
        configure(&mut field);
        state.insert_field(field.clone());
        field
    }

    /// Adds a public instance method returning `null`.
    pub fn add_method(
        &self,
        ty: &RemoteType,
        name: &str,
        params: &[&RemoteType],
        returns: Option<&RemoteType>,
    ) -> MethodInfo {
        self.add_method_with(ty, name, params, returns, |_| {})
    }

    pub fn add_method_with(
        &self,
        ty: &RemoteType,
        name: &str,
        params: &[&RemoteType],
        returns: Option<&RemoteType>,
        configure: impl FnOnce(&mut MethodInfo),
    ) -> MethodInfo {
        let mut state = lock(&self.state, "add_method");
        let mut method = state.new_method(ty, name, params, returns);
        configure(&mut method);
        let behavior = if method.is_constructor() {
            MethodBehavior::Construct
        } else {
            MethodBehavior::Return(RemoteValue::Null)
        };
        state.insert_method(method.clone(), behavior);
        method
    }

    pub fn set_behavior(&self, method: &MethodInfo, behavior: MethodBehavior) {
        lock(&self.state, "set_behavior")
            .behaviors
            .insert(method.id, behavior);
    }

    /// Adds a read-only property whose getter behaves as `getter`.
    pub fn add_property(
        &self,
        ty: &RemoteType,
        name: &str,
        property_type: &RemoteType,
        getter: MethodBehavior,
    ) -> PropertyInfo {
        self.add_property_with(ty, name, property_type, getter, |_| {})
    }

    /// Like [`MockDebuggee::add_property`]; `configure_getter` adjusts the
    /// getter (static, virtual, visibility, index parameters).
    pub fn add_property_with(
        &self,
        ty: &RemoteType,
        name: &str,
        property_type: &RemoteType,
        getter: MethodBehavior,
        configure_getter: impl FnOnce(&mut MethodInfo),
    ) -> PropertyInfo {
        let mut state = lock(&self.state, "add_property");
        let mut get = state.new_method(ty, &format!("get_{name}"), &[], Some(property_type));
        configure_getter(&mut get);
        state.insert_method(get.clone(), getter);
        let property = PropertyInfo {
            id: PropertyId(state.next()),
            name: name.to_string(),
            declaring_type: ty.id(),
            property_type: property_type.id(),
            getter: Some(get),
            setter: None,
            attributes: Vec::new(),
        };
        if let Some(t) = state.types.get_mut(&ty.id()) {
            t.properties.push(property.clone());
        }
        property
    }

    /// Replaces a previously added property's metadata (e.g. to attach
    /// attributes or a setter).
    pub fn update_property(&self, property: &PropertyInfo) {
        let mut state = lock(&self.state, "update_property");
        if let Some(t) = state.types.get_mut(&property.declaring_type) {
            if let Some(p) = t.properties.iter_mut().find(|p| p.id == property.id) {
                *p = property.clone();
            }
        }
        if let Some(setter) = &property.setter {
            if let Some(t) = state.types.get_mut(&property.declaring_type) {
                if !t.methods.iter().any(|m| m.id == setter.id) {
                    t.methods.push(setter.clone());
                }
            }
        }
    }

    pub fn new_object(&self, ty: &RemoteType, fields: Vec<(FieldId, RemoteValue)>) -> RemoteValue {
        let mut state = lock(&self.state, "new_object");
        let object = state.alloc(ty.id(), ObjectKind::Plain(fields.into_iter().collect()));
        RemoteValue::Object {
            object,
            ty: ty.clone(),
        }
    }

    pub fn new_string(&self, value: &str) -> RemoteValue {
        let ty = self.core("System.String");
        let mut state = lock(&self.state, "new_string");
        let object = state.alloc(ty.id(), ObjectKind::Str(value.to_string()));
        RemoteValue::String { object, ty }
    }

    pub fn new_array(&self, element: &RemoteType, values: Vec<RemoteValue>) -> RemoteValue {
        let ty = self.array_type(element);
        let mut state = lock(&self.state, "new_array");
        let object = state.alloc(ty.id(), ObjectKind::Array(values));
        RemoteValue::Array { object, ty }
    }

    pub fn struct_value(
        &self,
        ty: &RemoteType,
        fields: Vec<(FieldId, RemoteValue)>,
    ) -> RemoteValue {
        RemoteValue::Struct(StructValue {
            ty: ty.clone(),
            fields,
        })
    }

    /// A new exception object carrying `message` in `_message`.
    pub fn new_exception(&self, ty: &RemoteType, message: &str) -> RemoteValue {
        let message_field = self
            .fields(self.core("System.Exception").id())
            .unwrap_or_default()
            .into_iter()
            .find(|f| f.name == "_message")
            .map(|f| f.id);
        let text = self.new_string(message);
        self.new_object(ty, message_field.into_iter().map(|f| (f, text.clone())).collect())
    }

    pub fn set_static(&self, field: &FieldInfo, value: RemoteValue) {
        lock(&self.state, "set_static")
            .statics
            .insert(field.id, value);
    }

    /// Current content of an object's field, bypassing the client interface.
    pub fn field_value(&self, object: ObjectId, field: FieldId) -> Option<RemoteValue> {
        lock(&self.state, "field_value").object_field(object, field).ok()
    }

    pub fn add_frame(&self, frame: MockFrame) -> FrameId {
        let mut state = lock(&self.state, "add_frame");
        let id = FrameId(state.next());
        state.frames.insert(id, frame);
        id
    }

    pub fn set_current_exception(&self, thread: ThreadId, exception: RemoteValue) {
        lock(&self.state, "set_exception")
            .exceptions
            .insert(thread, exception);
    }

    /// Finishes a call started with [`MethodBehavior::Hang`].
    pub fn complete_invoke(&self, id: InvokeId) {
        if let Some(call) = lock(&self.state, "complete_invoke").pending.get_mut(&id) {
            if !call.finished {
                call.finished = true;
                let _ = call.signal.send(());
            }
        }
    }

    /// Invocations that have been started but not yet finished.
    pub fn unfinished_invokes(&self) -> Vec<InvokeId> {
        let state = lock(&self.state, "unfinished_invokes");
        let mut ids: Vec<InvokeId> = state
            .pending
            .iter()
            .filter(|(_, call)| !call.finished)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn calls(&self) -> MockCalls {
        lock(&self.state, "calls").calls.clone()
    }
}

impl DebuggeeClient for MockDebuggee {
    fn all_types(&self) -> ClientResult<Vec<RemoteType>> {
        let state = lock(&self.state, "all_types");
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.types.get(id))
            .filter(|t| t.loaded)
            .map(|t| t.info.clone())
            .collect())
    }

    fn type_info(&self, id: TypeId) -> ClientResult<RemoteType> {
        let state = lock(&self.state, "type_info");
        state
            .types
            .get(&id)
            .map(|t| t.info.clone())
            .ok_or_else(|| ClientError::InvalidHandle(id.to_string()))
    }

    fn find_type(&self, full_name: &str) -> ClientResult<Option<RemoteType>> {
        let state = lock(&self.state, "find_type");
        Ok(state
            .type_by_name(full_name)
            .filter(|t| t.loaded && t.indexed)
            .map(|t| t.info.clone()))
    }

    fn modules(&self) -> ClientResult<Vec<ModuleId>> {
        Ok(vec![MOCK_MODULE])
    }

    fn module_find_type(
        &self,
        module: ModuleId,
        full_name: &str,
    ) -> ClientResult<Option<RemoteType>> {
        if module != MOCK_MODULE {
            return Err(ClientError::InvalidHandle(module.to_string()));
        }
        let state = lock(&self.state, "module_find_type");
        Ok(state
            .type_by_name(full_name)
            .filter(|t| t.loaded)
            .map(|t| t.info.clone()))
    }

    fn force_load_type(&self, full_name: &str) -> ClientResult<Option<RemoteType>> {
        let mut state = lock(&self.state, "force_load_type");
        state.calls.force_load.push(full_name.to_string());
        let Some(id) = state.type_by_name(full_name).map(|t| t.info.id()) else {
            return Ok(None);
        };
        let ty = state.types.get_mut(&id).map(|t| {
            t.loaded = true;
            t.info.clone()
        });
        Ok(ty)
    }

    fn fields(&self, ty: TypeId) -> ClientResult<Vec<FieldInfo>> {
        Ok(lock(&self.state, "fields").ty(ty)?.fields.clone())
    }

    fn properties(&self, ty: TypeId) -> ClientResult<Vec<PropertyInfo>> {
        Ok(lock(&self.state, "properties").ty(ty)?.properties.clone())
    }

    fn interfaces(&self, ty: TypeId) -> ClientResult<Vec<RemoteType>> {
        let state = lock(&self.state, "interfaces");
        Ok(state
            .ty(ty)?
            .interfaces
            .iter()
            .filter_map(|id| state.types.get(id))
            .map(|t| t.info.clone())
            .collect())
    }

    fn methods_by_name(
        &self,
        ty: TypeId,
        name: &str,
        ignore_case: bool,
    ) -> ClientResult<Vec<MethodInfo>> {
        let mut state = lock(&self.state, "methods_by_name");
        state.calls.methods_by_name.push((ty, name.to_string()));
        Ok(state
            .ty(ty)?
            .methods
            .iter()
            .filter(|m| {
                if ignore_case {
                    m.name.eq_ignore_ascii_case(name)
                } else {
                    m.name == name
                }
            })
            .cloned()
            .collect())
    }

    fn nested_types(&self, ty: TypeId) -> ClientResult<Vec<RemoteType>> {
        let state = lock(&self.state, "nested_types");
        Ok(state
            .ty(ty)?
            .nested
            .iter()
            .filter_map(|id| state.types.get(id))
            .map(|t| t.info.clone())
            .collect())
    }

    fn custom_attributes(&self, ty: TypeId) -> ClientResult<Vec<CustomAttribute>> {
        let state = lock(&self.state, "custom_attributes");
        if state.fail_attributes {
            return Err(ClientError::Protocol(
                "custom attribute blob could not be decoded".to_string(),
            ));
        }
        Ok(state.ty(ty)?.attributes.clone())
    }

    fn is_external(&self, ty: TypeId) -> ClientResult<bool> {
        Ok(lock(&self.state, "is_external").ty(ty)?.external)
    }

    fn static_field(
        &self,
        _ty: TypeId,
        field: FieldId,
        _thread: ThreadId,
    ) -> ClientResult<RemoteValue> {
        Ok(lock(&self.state, "static_field")
            .statics
            .get(&field)
            .cloned()
            .unwrap_or(RemoteValue::Null))
    }

    fn set_static_field(
        &self,
        _ty: TypeId,
        field: FieldId,
        value: RemoteValue,
    ) -> ClientResult<()> {
        lock(&self.state, "set_static_field")
            .statics
            .insert(field, value);
        Ok(())
    }

    fn instance_field(&self, object: ObjectId, field: FieldId) -> ClientResult<RemoteValue> {
        lock(&self.state, "instance_field").object_field(object, field)
    }

    fn set_instance_field(
        &self,
        object: ObjectId,
        field: FieldId,
        value: RemoteValue,
    ) -> ClientResult<()> {
        let mut state = lock(&self.state, "set_instance_field");
        match state.objects.get_mut(&object) {
            Some(MockObject {
                kind: ObjectKind::Plain(fields),
                ..
            }) => {
                fields.insert(field, value);
                Ok(())
            }
            Some(_) => Err(ClientError::InvalidHandle(field.to_string())),
            None => Err(ClientError::InvalidObject(object)),
        }
    }

    fn string_value(&self, object: ObjectId) -> ClientResult<String> {
        match lock(&self.state, "string_value").objects.get(&object) {
            Some(MockObject {
                kind: ObjectKind::Str(s),
                ..
            }) => Ok(s.clone()),
            _ => Err(ClientError::InvalidObject(object)),
        }
    }

    fn create_string(&self, value: &str) -> ClientResult<RemoteValue> {
        Ok(self.new_string(value))
    }

    fn array_length(&self, array: ObjectId) -> ClientResult<usize> {
        match lock(&self.state, "array_length").objects.get(&array) {
            Some(MockObject {
                kind: ObjectKind::Array(items),
                ..
            }) => Ok(items.len()),
            _ => Err(ClientError::InvalidObject(array)),
        }
    }

    fn array_get(&self, array: ObjectId, index: usize) -> ClientResult<RemoteValue> {
        match lock(&self.state, "array_get").objects.get(&array) {
            Some(MockObject {
                kind: ObjectKind::Array(items),
                ..
            }) => items
                .get(index)
                .cloned()
                .ok_or_else(|| ClientError::Other(format!("index {index} out of range"))),
            _ => Err(ClientError::InvalidObject(array)),
        }
    }

    fn array_set(&self, array: ObjectId, index: usize, value: RemoteValue) -> ClientResult<()> {
        match lock(&self.state, "array_set").objects.get_mut(&array) {
            Some(MockObject {
                kind: ObjectKind::Array(items),
                ..
            }) => match items.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(ClientError::Other(format!("index {index} out of range"))),
            },
            _ => Err(ClientError::InvalidObject(array)),
        }
    }

    fn frame_method(&self, frame: FrameId) -> ClientResult<MethodInfo> {
        lock(&self.state, "frame_method")
            .frames
            .get(&frame)
            .map(|f| f.method.clone())
            .ok_or_else(|| ClientError::InvalidHandle(frame.to_string()))
    }

    fn frame_this(&self, _thread: ThreadId, frame: FrameId) -> ClientResult<RemoteValue> {
        let state = lock(&self.state, "frame_this");
        let frame = state
            .frames
            .get(&frame)
            .ok_or_else(|| ClientError::InvalidHandle(frame.to_string()))?;
        if frame.absent_information {
            return Err(ClientError::AbsentInformation);
        }
        Ok(frame.this.clone())
    }

    fn frame_locals(&self, frame: FrameId) -> ClientResult<Vec<LocalInfo>> {
        let state = lock(&self.state, "frame_locals");
        let frame = state
            .frames
            .get(&frame)
            .ok_or_else(|| ClientError::InvalidHandle(frame.to_string()))?;
        if frame.absent_information {
            return Err(ClientError::AbsentInformation);
        }
        Ok(frame.locals.iter().map(|(l, _)| l.clone()).collect())
    }

    fn local_value(&self, frame: FrameId, local: &LocalInfo) -> ClientResult<RemoteValue> {
        let state = lock(&self.state, "local_value");
        state
            .frames
            .get(&frame)
            .and_then(|f| {
                f.locals.iter().find(|(l, _)| {
                    l.index == local.index && l.is_argument == local.is_argument
                })
            })
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ClientError::InvalidHandle(format!("local {}", local.index)))
    }

    fn set_local_value(
        &self,
        frame: FrameId,
        local: &LocalInfo,
        value: RemoteValue,
    ) -> ClientResult<()> {
        let mut state = lock(&self.state, "set_local_value");
        let slot = state
            .frames
            .get_mut(&frame)
            .and_then(|f| {
                f.locals.iter_mut().find(|(l, _)| {
                    l.index == local.index && l.is_argument == local.is_argument
                })
            })
            .ok_or_else(|| ClientError::InvalidHandle(format!("local {}", local.index)))?;
        slot.1 = value;
        Ok(())
    }

    fn current_exception(&self, thread: ThreadId) -> ClientResult<Option<RemoteValue>> {
        Ok(lock(&self.state, "current_exception")
            .exceptions
            .get(&thread)
            .cloned())
    }

    fn begin_invoke(
        &self,
        thread: ThreadId,
        target: &InvokeTarget,
        method: MethodId,
        args: &[RemoteValue],
        options: InvokeOptions,
    ) -> ClientResult<PendingInvoke> {
        let mut state = lock(&self.state, "begin_invoke");
        let id = InvokeId(state.next());
        state.calls.begin_invoke.push(RecordedInvoke {
            id,
            thread,
            target: target.clone(),
            method,
            args: args.to_vec(),
            options,
        });

        let behavior = state
            .behaviors
            .get(&method)
            .cloned()
            .ok_or_else(|| ClientError::InvalidHandle(method.to_string()))?;
        if let MethodBehavior::FailBegin(err) = behavior {
            return Err(err);
        }
        state.check_receiver(target, method)?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let hangs = matches!(behavior, MethodBehavior::Hang(_));
        let result = state.run_method(target, method, behavior);
        if !hangs {
            let _ = tx.send(());
        }
        state.pending.insert(
            id,
            PendingCall {
                signal: tx,
                finished: !hangs,
                result,
            },
        );
        Ok(PendingInvoke { id, completed: rx })
    }

    fn end_invoke(&self, id: InvokeId) -> ClientResult<InvokeOutcome> {
        let mut state = lock(&self.state, "end_invoke");
        state.calls.end_invoke.push(id);
        match state.pending.get(&id) {
            None => Err(ClientError::InvalidHandle(id.to_string())),
            Some(call) if !call.finished => Err(ClientError::Protocol(format!(
                "{id} has not finished yet"
            ))),
            Some(_) => state
                .pending
                .remove(&id)
                .map(|call| call.result)
                .unwrap_or_else(|| Err(ClientError::InvalidHandle(id.to_string()))),
        }
    }

    fn abort_invoke(&self, id: InvokeId) -> ClientResult<()> {
        let mut state = lock(&self.state, "abort_invoke");
        state.calls.abort_invoke.push(id);
        let call = state
            .pending
            .get_mut(&id)
            .ok_or_else(|| ClientError::InvalidHandle(id.to_string()))?;
        if !call.finished {
            call.finished = true;
            call.result = Err(ClientError::Aborted);
            let _ = call.signal.send(());
        }
        Ok(())
    }
}

//! Debugger display metadata read from custom attributes.
//!
//! Everything here is read from attribute metadata; no code runs in the
//! debuggee. The result is advisory: failures leave the display data empty.

use std::collections::HashMap;

use nova_remote::{AttributeArgument, CustomAttribute, DebuggeeClient, PrimitiveValue, RemoteType};

use crate::{type_names::strip_assembly_qualification, EvalResult};

const DEBUGGER_DISPLAY: &str = "System.Diagnostics.DebuggerDisplayAttribute";
const DEBUGGER_TYPE_PROXY: &str = "System.Diagnostics.DebuggerTypeProxyAttribute";
const DEBUGGER_BROWSABLE: &str = "System.Diagnostics.DebuggerBrowsableAttribute";
const COMPILER_GENERATED: &str = "System.Runtime.CompilerServices.CompilerGeneratedAttribute";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrowsableState {
    Never,
    Collapsed,
    RootHidden,
}

impl BrowsableState {
    fn from_raw(raw: i128) -> Option<Self> {
        match raw {
            0 => Some(BrowsableState::Never),
            2 => Some(BrowsableState::Collapsed),
            3 => Some(BrowsableState::RootHidden),
            _ => None,
        }
    }
}

/// An attribute argument copied out of metadata.
///
/// Type arguments become their assembly-qualified name: a local value cannot
/// keep a live remote type handle.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalArgument {
    Null,
    Primitive(PrimitiveValue),
    String(String),
    Array(Vec<LocalArgument>),
}

impl LocalArgument {
    fn from_remote(arg: &AttributeArgument) -> Self {
        match arg {
            AttributeArgument::Null => LocalArgument::Null,
            AttributeArgument::Primitive(p) => LocalArgument::Primitive(*p),
            AttributeArgument::String(s) => LocalArgument::String(s.clone()),
            AttributeArgument::Type(ty) => LocalArgument::String(ty.qualified_name()),
            AttributeArgument::Array(items) => {
                LocalArgument::Array(items.iter().map(LocalArgument::from_remote).collect())
            }
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            LocalArgument::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i128> {
        match self {
            LocalArgument::Primitive(p) => p.as_i128(),
            _ => None,
        }
    }
}

/// Local equivalent of a recognised debugger attribute, populated from the
/// metadata blob without running the attribute's constructor.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalAttribute {
    Display {
        value: String,
        name: Option<String>,
        type_name: Option<String>,
    },
    TypeProxy {
        proxy_type: String,
    },
    Browsable(BrowsableState),
    CompilerGenerated,
}

impl LocalAttribute {
    pub fn from_remote(attribute: &CustomAttribute) -> Option<Self> {
        let ctor_args: Vec<LocalArgument> = attribute
            .constructor_args
            .iter()
            .map(LocalArgument::from_remote)
            .collect();
        let named = |name: &str| {
            attribute
                .named_arg(name)
                .map(LocalArgument::from_remote)
                .and_then(|arg| arg.as_str().map(str::to_string))
        };

        match attribute.attribute_type.full_name.as_str() {
            DEBUGGER_DISPLAY => Some(LocalAttribute::Display {
                value: ctor_args.first()?.as_str()?.to_string(),
                name: named("Name"),
                type_name: named("Type"),
            }),
            DEBUGGER_TYPE_PROXY => Some(LocalAttribute::TypeProxy {
                proxy_type: ctor_args.first()?.as_str()?.to_string(),
            }),
            DEBUGGER_BROWSABLE => {
                BrowsableState::from_raw(ctor_args.first()?.as_int()?)
                    .map(LocalAttribute::Browsable)
            }
            COMPILER_GENERATED => Some(LocalAttribute::CompilerGenerated),
            _ => None,
        }
    }
}

pub fn is_compiler_generated(attributes: &[CustomAttribute]) -> bool {
    attributes
        .iter()
        .any(|a| a.attribute_type.full_name == COMPILER_GENERATED)
}

/// Browsable state of a member: explicit attribute first, then hidden when
/// the member is compiler generated.
pub fn member_browsable(attributes: &[CustomAttribute]) -> Option<BrowsableState> {
    let explicit = attributes.iter().find_map(|a| match LocalAttribute::from_remote(a) {
        Some(LocalAttribute::Browsable(state)) => Some(state),
        _ => None,
    });
    explicit.or_else(|| is_compiler_generated(attributes).then_some(BrowsableState::Never))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayData {
    pub name_display: Option<String>,
    pub type_display: Option<String>,
    pub value_display: Option<String>,
    /// Assembly-qualified name of the proxy type shown instead of the value.
    pub proxy_type: Option<String>,
    pub is_compiler_generated: bool,
    /// Browsable state per field/property name; members absent here are
    /// shown normally.
    pub member_browsable: HashMap<String, BrowsableState>,
}

impl DisplayData {
    pub fn is_empty(&self) -> bool {
        *self == DisplayData::default()
    }

    pub fn browsable(&self, member: &str) -> Option<BrowsableState> {
        self.member_browsable.get(member).copied()
    }
}

/// Display metadata of `ty`. Never fails: errors are logged and yield empty
/// data.
pub fn extract_display_data(client: &dyn DebuggeeClient, ty: &RemoteType) -> DisplayData {
    match try_extract(client, ty) {
        Ok(data) => data,
        Err(err) => {
            tracing::debug!(
                target: "nova.eval",
                type_name = %ty.full_name,
                error = %err,
                "failed to read display attributes"
            );
            DisplayData::default()
        }
    }
}

fn try_extract(client: &dyn DebuggeeClient, ty: &RemoteType) -> EvalResult<DisplayData> {
    let mut data = DisplayData::default();
    for attribute in client.custom_attributes(ty.id())? {
        match LocalAttribute::from_remote(&attribute) {
            Some(LocalAttribute::Display {
                value,
                name,
                type_name,
            }) => {
                data.value_display = Some(value);
                data.name_display = name;
                data.type_display = type_name;
            }
            Some(LocalAttribute::TypeProxy { proxy_type }) => {
                ensure_loaded(client, &proxy_type)?;
                data.proxy_type = Some(proxy_type);
            }
            Some(LocalAttribute::CompilerGenerated) => data.is_compiler_generated = true,
            Some(LocalAttribute::Browsable(_)) | None => {}
        }
    }

    for field in client.fields(ty.id())? {
        if let Some(state) = member_browsable(&field.attributes) {
            data.member_browsable.insert(field.name, state);
        }
    }
    for property in client.properties(ty.id())? {
        if let Some(state) = member_browsable(&property.attributes) {
            data.member_browsable.insert(property.name, state);
        }
    }
    Ok(data)
}

fn ensure_loaded(client: &dyn DebuggeeClient, qualified_name: &str) -> EvalResult<()> {
    let name = strip_assembly_qualification(qualified_name);
    if client.find_type(name)?.is_none() {
        tracing::debug!(target: "nova.eval", type_name = name, "force-loading proxy type");
        client.force_load_type(name)?;
    }
    Ok(())
}

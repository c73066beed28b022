use std::fmt;

use crate::{FieldId, ObjectId, RemoteType};

/// A scalar carried by value in protocol replies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    /// A UTF-16 code unit; lone surrogates are valid values.
    Char(u16),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl PrimitiveValue {
    /// Full name of the runtime type this scalar boxes to.
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveValue::Bool(_) => "System.Boolean",
            PrimitiveValue::Char(_) => "System.Char",
            PrimitiveValue::I8(_) => "System.SByte",
            PrimitiveValue::U8(_) => "System.Byte",
            PrimitiveValue::I16(_) => "System.Int16",
            PrimitiveValue::U16(_) => "System.UInt16",
            PrimitiveValue::I32(_) => "System.Int32",
            PrimitiveValue::U32(_) => "System.UInt32",
            PrimitiveValue::I64(_) => "System.Int64",
            PrimitiveValue::U64(_) => "System.UInt64",
            PrimitiveValue::F32(_) => "System.Single",
            PrimitiveValue::F64(_) => "System.Double",
        }
    }

    /// The value as an integer, for integral kinds (and `char`).
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            PrimitiveValue::Char(c) => Some(i128::from(c)),
            PrimitiveValue::I8(v) => Some(i128::from(v)),
            PrimitiveValue::U8(v) => Some(i128::from(v)),
            PrimitiveValue::I16(v) => Some(i128::from(v)),
            PrimitiveValue::U16(v) => Some(i128::from(v)),
            PrimitiveValue::I32(v) => Some(i128::from(v)),
            PrimitiveValue::U32(v) => Some(i128::from(v)),
            PrimitiveValue::I64(v) => Some(i128::from(v)),
            PrimitiveValue::U64(v) => Some(i128::from(v)),
            PrimitiveValue::Bool(_) | PrimitiveValue::F32(_) | PrimitiveValue::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            PrimitiveValue::F32(v) => Some(f64::from(v)),
            PrimitiveValue::F64(v) => Some(v),
            PrimitiveValue::Bool(_) => None,
            _ => self.as_i128().map(|v| v as f64),
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Bool(true) => f.write_str("true"),
            PrimitiveValue::Bool(false) => f.write_str("false"),
            PrimitiveValue::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(ch) => write!(f, "'{ch}'"),
                None => write!(f, "'\\u{c:04x}'"),
            },
            PrimitiveValue::I8(v) => write!(f, "{v}"),
            PrimitiveValue::U8(v) => write!(f, "{v}"),
            PrimitiveValue::I16(v) => write!(f, "{v}"),
            PrimitiveValue::U16(v) => write!(f, "{v}"),
            PrimitiveValue::I32(v) => write!(f, "{v}"),
            PrimitiveValue::U32(v) => write!(f, "{v}"),
            PrimitiveValue::I64(v) => write!(f, "{v}"),
            PrimitiveValue::U64(v) => write!(f, "{v}"),
            PrimitiveValue::F32(v) => write!(f, "{v}"),
            PrimitiveValue::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Snapshot of a value-type instance. Field contents travel by value with the
/// struct, so reading them needs no further round trip.
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    pub ty: RemoteType,
    pub fields: Vec<(FieldId, RemoteValue)>,
}

impl StructValue {
    pub fn field(&self, id: FieldId) -> Option<&RemoteValue> {
        self.fields.iter().find(|(f, _)| *f == id).map(|(_, v)| v)
    }
}

/// A value observed in the target.
///
/// The set of shapes is closed: classification code matches on it
/// exhaustively.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteValue {
    Null,
    Primitive(PrimitiveValue),
    String { object: ObjectId, ty: RemoteType },
    Array { object: ObjectId, ty: RemoteType },
    Struct(StructValue),
    Object { object: ObjectId, ty: RemoteType },
    Enum { ty: RemoteType, value: PrimitiveValue },
}

impl RemoteValue {
    /// The runtime type of non-null, non-primitive values.
    pub fn remote_type(&self) -> Option<&RemoteType> {
        match self {
            RemoteValue::Null | RemoteValue::Primitive(_) => None,
            RemoteValue::String { ty, .. }
            | RemoteValue::Array { ty, .. }
            | RemoteValue::Object { ty, .. }
            | RemoteValue::Enum { ty, .. } => Some(ty),
            RemoteValue::Struct(s) => Some(&s.ty),
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            RemoteValue::String { object, .. }
            | RemoteValue::Array { object, .. }
            | RemoteValue::Object { object, .. } => Some(*object),
            RemoteValue::Null
            | RemoteValue::Primitive(_)
            | RemoteValue::Struct(_)
            | RemoteValue::Enum { .. } => None,
        }
    }
}

impl From<PrimitiveValue> for RemoteValue {
    fn from(value: PrimitiveValue) -> Self {
        RemoteValue::Primitive(value)
    }
}

use crate::error::ShadowError;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Dynamically typed argument or return value crossing the dispatch seam.
///
/// Real implementations and shadow handlers exchange arguments as `Value`s so
/// one erased handler table can serve every method signature. Object values
/// compare by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Vec<Value>),
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Value::Object(value)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn as_bool(&self) -> Result<bool, ShadowError> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64, ShadowError> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, ShadowError> {
        match self {
            Value::Float(value) => Ok(*value),
            Value::Int(value) => {
                exact_float(*value).ok_or(ShadowError::ValueMismatch { expected: "float", actual: "inexact int" })
            }
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ShadowError> {
        match self {
            Value::String(value) => Ok(value),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], ShadowError> {
        match self {
            Value::List(values) => Ok(values),
            other => Err(other.mismatch("list")),
        }
    }

    /// Downcasts an object value to the concrete type it carries.
    pub fn as_object<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ShadowError> {
        match self {
            Value::Object(object) => Arc::clone(object)
                .downcast::<T>()
                .map_err(|_| ShadowError::ValueMismatch {
                    expected: std::any::type_name::<T>(),
                    actual: "object",
                }),
            other => Err(other.mismatch(std::any::type_name::<T>())),
        }
    }

    pub fn into_unit(self) -> Result<(), ShadowError> {
        match self {
            Value::Unit => Ok(()),
            other => Err(other.mismatch("unit")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ShadowError {
        ShadowError::ValueMismatch { expected, actual: self.type_name() }
    }
}

/// Integers up to 2^53 in magnitude convert to `f64` without rounding.
const MAX_EXACT_INT: u64 = 1 << f64::MANTISSA_DIGITS;

#[allow(clippy::cast_precision_loss)]
fn exact_float(value: i64) -> Option<f64> {
    (value.unsigned_abs() <= MAX_EXACT_INT).then_some(value as f64)
}

/// Argument `index` of a real implementation's argument slice.
pub fn arg(args: &[Value], index: usize) -> Result<&Value, ShadowError> {
    args.get(index).ok_or(ShadowError::ValueMismatch { expected: "argument", actual: "nothing" })
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => f.write_str("Unit"),
            Value::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Value::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Value::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Value::String(value) => f.debug_tuple("String").field(value).finish(),
            Value::List(values) => f.debug_tuple("List").field(values).finish(),
            Value::Object(object) => write!(f, "Object({:p})", Arc::as_ptr(object)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl TryFrom<Value> for () {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.into_unit()
    }
}

impl TryFrom<Value> for bool {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool()
    }
}

impl TryFrom<Value> for i64 {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_int()
    }
}

impl TryFrom<Value> for i32 {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let wide = value.as_int()?;
        i32::try_from(wide)
            .map_err(|_| ShadowError::ValueMismatch { expected: "i32", actual: "out-of-range int" })
    }
}

impl TryFrom<Value> for f64 {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_float()
    }
}

impl TryFrom<Value> for String {
    type Error = ShadowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_str().map(str::to_owned)
    }
}

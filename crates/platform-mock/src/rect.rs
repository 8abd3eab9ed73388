use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use umbra_core::{ClassInfo, MethodSignature, ObjectHeader, PlatformClass, Reflect, ShadowError, Value, arg};

pub const WIDTH: MethodSignature = MethodSignature::new("width", &[]);
pub const HEIGHT: MethodSignature = MethodSignature::new("height", &[]);
pub const CONTAINS: MethodSignature = MethodSignature::new("contains", &["int", "int"]);

const EDGES: [&str; 4] = ["left", "top", "right", "bottom"];

/// Plain value class without a shadow; every call runs real code.
pub static RECT: ClassInfo =
    ClassInfo::new("mock.graphics.Rect").with_methods(&[WIDTH, HEIGHT, CONTAINS]).with_fields(&EDGES);

#[derive(Debug, Default)]
pub struct Rect {
    header: ObjectHeader,
    edges: Mutex<[i64; 4]>,
}

impl Rect {
    /// Constructor arguments for a rect with the given edges.
    pub fn args(left: i64, top: i64, right: i64, bottom: i64) -> Vec<Value> {
        vec![Value::Int(left), Value::Int(top), Value::Int(right), Value::Int(bottom)]
    }

    pub fn width(self: &Arc<Self>) -> Result<i64, ShadowError> {
        self.dispatch(&WIDTH, Vec::new(), |this, _| {
            let [left, _, right, _] = *this.edges();
            Ok(Value::Int(right - left))
        })?
        .try_into()
    }

    pub fn height(self: &Arc<Self>) -> Result<i64, ShadowError> {
        self.dispatch(&HEIGHT, Vec::new(), |this, _| {
            let [_, top, _, bottom] = *this.edges();
            Ok(Value::Int(bottom - top))
        })?
        .try_into()
    }

    /// Half-open containment: left and top edges are inside, right and bottom are not.
    pub fn contains(self: &Arc<Self>, x: i64, y: i64) -> Result<bool, ShadowError> {
        self.dispatch(&CONTAINS, vec![Value::Int(x), Value::Int(y)], |this, args| {
            let (x, y) = (arg(args, 0)?.as_int()?, arg(args, 1)?.as_int()?);
            let [left, top, right, bottom] = *this.edges();
            Ok(Value::Bool(left < right && top < bottom && (left..right).contains(&x) && (top..bottom).contains(&y)))
        })?
        .try_into()
    }

    fn edges(&self) -> MutexGuard<'_, [i64; 4]> {
        self.edges.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reflect for Rect {
    fn class(&self) -> &'static ClassInfo {
        &RECT
    }

    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        let index = EDGES.iter().position(|edge| *edge == name)?;
        Some(Value::Int(self.edges()[index]))
    }

    fn write_field(&self, name: &str, value: Value) -> Option<Result<(), ShadowError>> {
        let index = EDGES.iter().position(|edge| *edge == name)?;
        Some(value.as_int().map(|edge| self.edges()[index] = edge))
    }

    fn invoke_declared(
        self: Arc<Self>,
        signature: &'static MethodSignature,
        args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        let result = match signature.name() {
            "width" => self.width().map(Value::Int),
            "height" => self.height().map(Value::Int),
            "contains" => arg(args, 0)
                .and_then(Value::as_int)
                .and_then(|x| self.contains(x, arg(args, 1)?.as_int()?))
                .map(Value::Bool),
            _ => return None,
        };
        Some(result)
    }
}

impl PlatformClass for Rect {
    fn class_info() -> &'static ClassInfo {
        &RECT
    }

    /// Takes no arguments (empty rect) or the four edges.
    fn construct(self: &Arc<Self>, args: &[Value]) -> Result<(), ShadowError> {
        if args.is_empty() {
            return Ok(());
        }
        let mut edges = [0; 4];
        for (index, edge) in edges.iter_mut().enumerate() {
            *edge = arg(args, index)?.as_int()?;
        }
        *self.edges() = edges;
        Ok(())
    }
}

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;
use umbra_core::{ClassInfo, MethodSignature, ObjectHeader, PlatformClass, Reflect, ShadowError, StaticField, Value, arg};
use umbra_looper::Looper;

pub const VISIBLE: i64 = 0;
pub const INVISIBLE: i64 = 4;
pub const GONE: i64 = 8;

pub const SET_VISIBILITY: MethodSignature = MethodSignature::new("setVisibility", &["int"]);
pub const GET_VISIBILITY: MethodSignature = MethodSignature::new("getVisibility", &[]);
pub const INVALIDATE: MethodSignature = MethodSignature::new("invalidate", &[]);
pub const POST_DELAYED: MethodSignature = MethodSignature::new("postDelayed", &["Runnable", "long"]);

static NEXT_VIEW_ID: AtomicI64 = AtomicI64::new(1);

pub static VIEW: ClassInfo = ClassInfo::new("mock.view.View")
    .with_methods(&[SET_VISIBILITY, GET_VISIBILITY, INVALIDATE, POST_DELAYED])
    .with_fields(&["mID", "mVisibility", "mInvalidations"])
    .with_static_fields(&[StaticField {
        name: "sNextGeneratedId",
        get: next_view_id,
        set: Some(set_next_view_id),
    }]);

fn next_view_id() -> Value {
    Value::Int(NEXT_VIEW_ID.load(Ordering::SeqCst))
}

fn set_next_view_id(value: Value) -> Result<(), ShadowError> {
    NEXT_VIEW_ID.store(value.as_int()?, Ordering::SeqCst);
    Ok(())
}

/// Work posted through a view, passed around as an object argument.
#[derive(Clone)]
pub struct Runnable(Arc<dyn Fn() + Send + Sync>);

impl Runnable {
    pub fn new(run: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(run))
    }

    pub fn run(&self) {
        (self.0)();
    }
}

impl Debug for Runnable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Runnable")
    }
}

/// State shared by every view class. Subclasses embed it.
#[derive(Debug, Default)]
pub struct ViewState {
    header: ObjectHeader,
    id: AtomicI64,
    visibility: AtomicI64,
    invalidations: AtomicI64,
    looper: Mutex<Option<Arc<Looper>>>,
}

impl ViewState {
    /// Real constructor body: assigns the next view id and attaches the
    /// looper passed as the optional first argument.
    pub(crate) fn init(&self, args: &[Value]) -> Result<(), ShadowError> {
        let id = NEXT_VIEW_ID.fetch_add(1, Ordering::SeqCst);
        self.id.store(id, Ordering::SeqCst);
        if let Some(looper) = args.first() {
            *self.looper_slot() = Some(looper.as_object::<Looper>()?);
        }
        trace!(id, attached = args.first().is_some(), "view initialized");
        Ok(())
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn id(&self) -> i64 {
        self.id.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> i64 {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn looper(&self) -> Option<Arc<Looper>> {
        self.looper_slot().clone()
    }

    pub(crate) fn read_field(&self, name: &str) -> Option<Value> {
        match name {
            "mID" => Some(Value::Int(self.id())),
            "mVisibility" => Some(Value::Int(self.visibility.load(Ordering::SeqCst))),
            "mInvalidations" => Some(Value::Int(self.invalidations())),
            _ => None,
        }
    }

    pub(crate) fn write_field(&self, name: &str, value: &Value) -> Option<Result<(), ShadowError>> {
        match name {
            "mVisibility" => Some(value.as_int().map(|visibility| self.visibility.store(visibility, Ordering::SeqCst))),
            _ => None,
        }
    }

    fn looper_slot(&self) -> MutexGuard<'_, Option<Arc<Looper>>> {
        self.looper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Methods every view class inherits.
pub trait ViewApi: PlatformClass {
    fn view_state(&self) -> &ViewState;

    fn view_id(&self) -> i64 {
        self.view_state().id()
    }

    fn set_visibility(self: &Arc<Self>, visibility: i64) -> Result<(), ShadowError> {
        self.dispatch(&SET_VISIBILITY, vec![Value::Int(visibility)], |this, args| {
            this.view_state().visibility.store(arg(args, 0)?.as_int()?, Ordering::SeqCst);
            Ok(Value::Unit)
        })?
        .into_unit()
    }

    fn visibility(self: &Arc<Self>) -> Result<i64, ShadowError> {
        self.dispatch(&GET_VISIBILITY, Vec::new(), |this, _| {
            Ok(Value::Int(this.view_state().visibility.load(Ordering::SeqCst)))
        })?
        .try_into()
    }

    fn invalidate(self: &Arc<Self>) -> Result<(), ShadowError> {
        self.dispatch(&INVALIDATE, Vec::new(), |this, _| {
            this.view_state().invalidations.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        })?
        .into_unit()
    }

    /// Posts `runnable` to the view's looper. Returns `false` for a view
    /// without a looper or when the looper rejects the post.
    fn post_delayed(self: &Arc<Self>, runnable: Runnable, delay_ms: u64) -> Result<bool, ShadowError> {
        let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
        self.dispatch(&POST_DELAYED, vec![Value::object(runnable), Value::Int(delay)], |this, args| {
            let runnable = arg(args, 0)?.as_object::<Runnable>()?;
            let delay = u64::try_from(arg(args, 1)?.as_int()?).unwrap_or(0);
            let posted = this
                .view_state()
                .looper()
                .is_some_and(|looper| looper.post_delayed(move || runnable.run(), delay));
            Ok(Value::Bool(posted))
        })?
        .try_into()
    }
}

/// Reflective invocation of the methods declared on [`VIEW`].
pub(crate) fn invoke_view<T: ViewApi>(
    this: &Arc<T>,
    signature: &MethodSignature,
    args: &[Value],
) -> Option<Result<Value, ShadowError>> {
    let result = match signature.name() {
        "setVisibility" => arg(args, 0)
            .and_then(Value::as_int)
            .and_then(|visibility| this.set_visibility(visibility))
            .map(Value::from),
        "getVisibility" => this.visibility().map(Value::Int),
        "invalidate" => this.invalidate().map(Value::from),
        "postDelayed" => arg(args, 0).and_then(Value::as_object::<Runnable>).and_then(|runnable| {
            let delay = u64::try_from(arg(args, 1)?.as_int()?).unwrap_or(0);
            this.post_delayed((*runnable).clone(), delay).map(Value::Bool)
        }),
        _ => return None,
    };
    Some(result)
}

#[derive(Debug, Default)]
pub struct View {
    state: ViewState,
}

impl Reflect for View {
    fn class(&self) -> &'static ClassInfo {
        &VIEW
    }

    fn header(&self) -> &ObjectHeader {
        self.state.header()
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        self.state.read_field(name)
    }

    fn write_field(&self, name: &str, value: Value) -> Option<Result<(), ShadowError>> {
        self.state.write_field(name, &value)
    }

    fn invoke_declared(
        self: Arc<Self>,
        signature: &'static MethodSignature,
        args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        invoke_view(&self, signature, args)
    }
}

impl PlatformClass for View {
    fn class_info() -> &'static ClassInfo {
        &VIEW
    }

    fn construct(self: &Arc<Self>, args: &[Value]) -> Result<(), ShadowError> {
        self.state.init(args)
    }
}

impl ViewApi for View {
    fn view_state(&self) -> &ViewState {
        &self.state
    }
}

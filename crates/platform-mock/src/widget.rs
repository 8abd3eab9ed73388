use crate::view::{Runnable, VIEW, ViewApi, ViewState, invoke_view};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use umbra_core::{ClassInfo, MethodSignature, ObjectHeader, PlatformClass, Reflect, ShadowError, Value, arg};

pub const SET_TEXT: MethodSignature = MethodSignature::new("setText", &["CharSequence"]);
pub const GET_TEXT: MethodSignature = MethodSignature::new("getText", &[]);
pub const APPEND: MethodSignature = MethodSignature::new("append", &["CharSequence"]);
pub const PERFORM_CLICK: MethodSignature = MethodSignature::new("performClick", &[]);
pub const SET_ON_CLICK_LISTENER: MethodSignature = MethodSignature::new("setOnClickListener", &["OnClickListener"]);

pub static TEXT_VIEW: ClassInfo = ClassInfo::new("mock.widget.TextView")
    .extends(&VIEW)
    .with_methods(&[SET_TEXT, GET_TEXT, APPEND])
    .with_fields(&["mText"]);

pub static BUTTON: ClassInfo = ClassInfo::new("mock.widget.Button")
    .extends(&TEXT_VIEW)
    .with_methods(&[PERFORM_CLICK, SET_ON_CLICK_LISTENER])
    .with_fields(&["mOnClickListener"]);

#[derive(Debug, Default)]
pub struct TextState {
    text: Mutex<String>,
}

impl TextState {
    fn text(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        (name == "mText").then(|| Value::from(self.text().clone()))
    }

    fn write_field(&self, name: &str, value: &Value) -> Option<Result<(), ShadowError>> {
        (name == "mText").then(|| value.as_str().map(|text| *self.text() = text.to_owned()))
    }
}

/// Methods every text view class inherits.
pub trait TextViewApi: ViewApi {
    fn text_state(&self) -> &TextState;

    /// Replaces the text and invalidates the view.
    fn set_text(self: &Arc<Self>, text: &str) -> Result<(), ShadowError> {
        self.dispatch(&SET_TEXT, vec![Value::from(text)], |this, args| {
            *this.text_state().text() = arg(args, 0)?.as_str()?.to_owned();
            this.invalidate()?;
            Ok(Value::Unit)
        })?
        .into_unit()
    }

    fn text(self: &Arc<Self>) -> Result<String, ShadowError> {
        self.dispatch(&GET_TEXT, Vec::new(), |this, _| Ok(Value::from(this.text_state().text().clone())))?
            .try_into()
    }

    /// Appends to the text and invalidates the view.
    fn append(self: &Arc<Self>, text: &str) -> Result<(), ShadowError> {
        self.dispatch(&APPEND, vec![Value::from(text)], |this, args| {
            this.text_state().text().push_str(arg(args, 0)?.as_str()?);
            this.invalidate()?;
            Ok(Value::Unit)
        })?
        .into_unit()
    }
}

fn invoke_text_view<T: TextViewApi>(
    this: &Arc<T>,
    signature: &MethodSignature,
    args: &[Value],
) -> Option<Result<Value, ShadowError>> {
    let result = match signature.name() {
        "setText" => arg(args, 0).and_then(Value::as_str).and_then(|text| this.set_text(text)).map(Value::from),
        "getText" => this.text().map(Value::from),
        "append" => arg(args, 0).and_then(Value::as_str).and_then(|text| this.append(text)).map(Value::from),
        _ => return invoke_view(this, signature, args),
    };
    Some(result)
}

#[derive(Debug, Default)]
pub struct TextView {
    view: ViewState,
    text: TextState,
}

impl Reflect for TextView {
    fn class(&self) -> &'static ClassInfo {
        &TEXT_VIEW
    }

    fn header(&self) -> &ObjectHeader {
        self.view.header()
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        self.text.read_field(name).or_else(|| self.view.read_field(name))
    }

    fn write_field(&self, name: &str, value: Value) -> Option<Result<(), ShadowError>> {
        self.text.write_field(name, &value).or_else(|| self.view.write_field(name, &value))
    }

    fn invoke_declared(
        self: Arc<Self>,
        signature: &'static MethodSignature,
        args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        invoke_text_view(&self, signature, args)
    }
}

impl PlatformClass for TextView {
    fn class_info() -> &'static ClassInfo {
        &TEXT_VIEW
    }

    fn construct(self: &Arc<Self>, args: &[Value]) -> Result<(), ShadowError> {
        self.view.init(args)
    }
}

impl ViewApi for TextView {
    fn view_state(&self) -> &ViewState {
        &self.view
    }
}

impl TextViewApi for TextView {
    fn text_state(&self) -> &TextState {
        &self.text
    }
}

#[derive(Debug, Default)]
pub struct Button {
    view: ViewState,
    text: TextState,
    listener: Mutex<Option<Runnable>>,
}

impl Button {
    pub fn set_on_click_listener(self: &Arc<Self>, listener: Runnable) -> Result<(), ShadowError> {
        self.dispatch(&SET_ON_CLICK_LISTENER, vec![Value::object(listener)], |this, args| {
            let listener = arg(args, 0)?.as_object::<Runnable>()?;
            *this.listener() = Some((*listener).clone());
            Ok(Value::Unit)
        })?
        .into_unit()
    }

    /// Runs the click listener. Returns whether one was set.
    pub fn perform_click(self: &Arc<Self>) -> Result<bool, ShadowError> {
        self.dispatch(&PERFORM_CLICK, Vec::new(), |this, _| {
            let listener = this.listener().clone();
            if let Some(listener) = &listener {
                listener.run();
            }
            Ok(Value::Bool(listener.is_some()))
        })?
        .try_into()
    }

    fn listener(&self) -> MutexGuard<'_, Option<Runnable>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reflect for Button {
    fn class(&self) -> &'static ClassInfo {
        &BUTTON
    }

    fn header(&self) -> &ObjectHeader {
        self.view.header()
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        match name {
            "mOnClickListener" => Some(Value::Bool(self.listener().is_some())),
            _ => self.text.read_field(name).or_else(|| self.view.read_field(name)),
        }
    }

    fn write_field(&self, name: &str, value: Value) -> Option<Result<(), ShadowError>> {
        self.text.write_field(name, &value).or_else(|| self.view.write_field(name, &value))
    }

    fn invoke_declared(
        self: Arc<Self>,
        signature: &'static MethodSignature,
        args: &[Value],
    ) -> Option<Result<Value, ShadowError>> {
        let result = match signature.name() {
            "performClick" => self.perform_click().map(Value::Bool),
            "setOnClickListener" => arg(args, 0)
                .and_then(Value::as_object::<Runnable>)
                .and_then(|listener| self.set_on_click_listener((*listener).clone()))
                .map(Value::from),
            _ => return invoke_text_view(&self, signature, args),
        };
        Some(result)
    }
}

impl PlatformClass for Button {
    fn class_info() -> &'static ClassInfo {
        &BUTTON
    }

    fn construct(self: &Arc<Self>, args: &[Value]) -> Result<(), ShadowError> {
        self.view.init(args)
    }
}

impl ViewApi for Button {
    fn view_state(&self) -> &ViewState {
        &self.view
    }
}

impl TextViewApi for Button {
    fn text_state(&self) -> &TextState {
        &self.text
    }
}

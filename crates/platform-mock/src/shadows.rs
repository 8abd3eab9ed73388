//! Shadows for the mock widgets, registered for bootstrap.

use crate::view::{INVALIDATE, POST_DELAYED, VIEW};
use crate::widget::{APPEND, SET_TEXT, TEXT_VIEW};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use umbra_core::{
    ApiLevel, ApiRange, RealObject, Shadow, ShadowClass, ShadowClassBuilder, Value, register_shadow,
};
use umbra_runtime::{get_field, set_field};

/// Last API level served by [`legacy_shadow_text_view`].
pub const LEGACY_TEXT_VIEW_MAX: ApiLevel = ApiLevel(20);

register_shadow!(shadow_view);
register_shadow!(legacy_shadow_text_view, ApiRange::new(ApiLevel::MIN, LEGACY_TEXT_VIEW_MAX));
register_shadow!(shadow_text_view, ApiRange::new(ApiLevel(LEGACY_TEXT_VIEW_MAX.0 + 1), ApiLevel::MAX));

/// Records invalidation and successful posts of any view.
#[derive(Debug)]
pub struct ShadowView {
    real: RealObject,
    invalidated: AtomicBool,
    posted: AtomicUsize,
}

impl Shadow for ShadowView {
    fn create(real: RealObject) -> Self {
        Self { real, invalidated: AtomicBool::new(false), posted: AtomicUsize::new(0) }
    }
}

impl ShadowView {
    pub fn real(&self) -> &RealObject {
        &self.real
    }

    pub fn was_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    pub fn clear_was_invalidated(&self) {
        self.invalidated.store(false, Ordering::SeqCst);
    }

    /// Runnables the view's looper accepted.
    pub fn posted_runnables(&self) -> usize {
        self.posted.load(Ordering::SeqCst)
    }
}

impl AsRef<ShadowView> for ShadowView {
    fn as_ref(&self) -> &ShadowView {
        self
    }
}

/// Adds the view handlers to a shadow of any view subclass.
fn with_view_handlers<S>(builder: ShadowClassBuilder<S>) -> ShadowClassBuilder<S>
where
    S: Shadow + AsRef<ShadowView>,
{
    builder
        .method(INVALIDATE, |shadow, call| {
            shadow.as_ref().invalidated.store(true, Ordering::SeqCst);
            call.call_real_with_original_args()
        })
        .method(POST_DELAYED, |shadow, call| {
            let posted = call.call_real_with_original_args()?;
            if posted.as_bool()? {
                shadow.as_ref().posted.fetch_add(1, Ordering::SeqCst);
            }
            Ok(posted)
        })
}

pub fn shadow_view() -> ShadowClass {
    with_view_handlers(ShadowClass::builder::<ShadowView>("ShadowView", &VIEW)).build()
}

/// View shadow plus the history of every text a text view was given.
#[derive(Debug)]
pub struct ShadowTextView {
    view: ShadowView,
    history: Mutex<Vec<String>>,
}

impl Shadow for ShadowTextView {
    fn create(real: RealObject) -> Self {
        Self { view: ShadowView::create(real), history: Mutex::new(Vec::new()) }
    }
}

impl ShadowTextView {
    pub fn view(&self) -> &ShadowView {
        &self.view
    }

    pub fn text_history(&self) -> Vec<String> {
        self.history().clone()
    }

    fn history(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AsRef<ShadowView> for ShadowTextView {
    fn as_ref(&self) -> &ShadowView {
        &self.view
    }
}

fn text_view_builder(name: &'static str) -> ShadowClassBuilder<ShadowTextView> {
    with_view_handlers(ShadowClass::builder::<ShadowTextView>(name, &TEXT_VIEW)).method(SET_TEXT, |shadow, call| {
        let text: String = call.arg_as(0)?;
        shadow.history().push(text);
        call.call_real_with_original_args()
    })
}

pub fn shadow_text_view() -> ShadowClass {
    text_view_builder("ShadowTextView").build()
}

/// Older platform levels appended by writing `mText` directly, without
/// invalidating the view.
pub fn legacy_shadow_text_view() -> ShadowClass {
    text_view_builder("LegacyShadowTextView")
        .method(APPEND, |shadow, call| {
            let suffix: String = call.arg_as(0)?;
            let Some(real) = shadow.view.real.upgrade() else {
                return call.call_real_with_original_args();
            };
            let text = format!("{}{suffix}", get_field(&*real, "mText")?.as_str()?);
            set_field(&*real, "mText", Value::from(text.as_str()))?;
            shadow.history().push(text);
            Ok(Value::Unit)
        })
        .build()
}

//! Simulated platform surface for Umbra tests.
//!
//! A handful of widget classes route their methods through the shadow
//! runtime, and bootstrap shadows for them are registered with
//! [`umbra_core::register_shadow!`]: `View` and `TextView` (with separate
//! shadows below and above API 21) are shadowed, `Button` inherits the
//! text view shadow and `Rect` has none.

mod rect;
mod shadows;
mod view;
mod widget;

pub use rect::{CONTAINS, HEIGHT, RECT, Rect, WIDTH};
pub use shadows::{
    LEGACY_TEXT_VIEW_MAX, ShadowTextView, ShadowView, legacy_shadow_text_view, shadow_text_view, shadow_view,
};
pub use view::{
    GET_VISIBILITY, GONE, INVALIDATE, INVISIBLE, POST_DELAYED, Runnable, SET_VISIBILITY, VIEW, VISIBLE, View,
    ViewApi, ViewState,
};
pub use widget::{
    APPEND, BUTTON, Button, GET_TEXT, PERFORM_CLICK, SET_ON_CLICK_LISTENER, SET_TEXT, TEXT_VIEW, TextState,
    TextView, TextViewApi,
};

//! Terminal UI layer.
//!
//! - [`program`] runs the event loop around a root component and
//!   [`lifecycle`] owns raw mode and the alternate screen.
//! - [`chat_panel`] and [`model_chooser`] are the reusable components;
//!   [`picker`] and [`spinner`] are the state they build on.
//!
//! Ownership boundary: this layer presents and captures interaction state,
//! while [`crate::core`] owns sessions and backend coordination.

pub mod chat_panel;
pub mod lifecycle;
pub mod model_chooser;
pub mod picker;
pub mod program;
pub mod spinner;

//! Terminal UI building blocks and command-line tools for Ollama.
//!
//! The crate is organized in layers:
//! - [`api`] holds the Ollama wire types and the [`api::Transport`] seam the
//!   components talk through.
//! - [`core`] owns the component model: messages, commands, and the
//!   generation and embedding sessions that turn them into backend work.
//! - [`ui`] renders components with ratatui and runs the event loop.
//! - [`convert`] rasterizes ANSI terminal text into PNG images.
//! - [`cli`] contains the `otui-*` tools, each wired to a thin binary in
//!   `src/bin/`.

pub mod api;
pub mod cli;
pub mod convert;
pub mod core;
pub mod logging;
pub mod ui;
pub mod utils;

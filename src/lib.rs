//! TileFE — interactive tile-map editing and compositing engine.
//!
//! The engine proper (`point`, `tile`, `grid`, `canvas`, `io`) is
//! UI-agnostic; `app` and `components` wrap it in the egui shell, and `cli`
//! exposes a headless render path.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod grid;
pub mod io;
pub mod logger;
pub mod point;
pub mod project;
pub mod tile;

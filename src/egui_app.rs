//! Desktop UI: state machine, background jobs, and egui rendering.

pub mod controller;
pub mod state;
pub mod ui;

pub use controller::EguiController;
pub use ui::EguiApp;

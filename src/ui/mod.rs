//! egui front end
//!
//! [`DocTutorApp`] switches between the screens; each screen is a component
//! in [`components`] rendering one session from [`crate::session`].

pub mod app;
pub mod components;
pub mod theme;

pub use app::DocTutorApp;
pub use theme::Theme;

//! View components, one per screen

mod chat_view;
mod mode_picker;
mod tutor_view;
mod upload_panel;
mod voice_view;

pub use chat_view::ChatView;
pub use mode_picker::{ModePicker, PickerAction};
pub use tutor_view::TutorView;
pub use upload_panel::UploadPanel;
pub use voice_view::{VoiceInput, VoiceView};

/// Attach an AccessKit label to a widget response
pub(crate) fn labeled(response: &egui::Response, kind: egui::WidgetType, label: &str) {
    let enabled = response.enabled();
    response.widget_info(|| egui::WidgetInfo::labeled(kind, enabled, label));
}

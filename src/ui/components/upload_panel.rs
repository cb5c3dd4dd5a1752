//! Document intake screen

use super::labeled;
use crate::session::DocumentIntake;
use crate::ui::theme::Theme;
use egui::{self, RichText, WidgetType};

/// File picker and upload button
///
/// Files can be chosen by typing a path or by dropping them on the window.
pub struct UploadPanel<'a> {
    intake: &'a mut DocumentIntake,
    path: &'a mut String,
    theme: &'a Theme,
}

impl<'a> UploadPanel<'a> {
    pub fn new(intake: &'a mut DocumentIntake, path: &'a mut String, theme: &'a Theme) -> Self {
        Self {
            intake,
            path,
            theme,
        }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        self.take_dropped_file(ui);

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing_lg)
            .show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(
                        RichText::new("Upload Your Document").color(self.theme.text_primary),
                    );
                    ui.label(
                        RichText::new(
                            "Choose a PDF or TXT file to get started with tutoring or chatting",
                        )
                        .color(self.theme.text_muted),
                    );
                });

                ui.add_space(self.theme.spacing);

                ui.horizontal(|ui| {
                    let edit = egui::TextEdit::singleline(&mut *self.path)
                        .hint_text("Path to a .pdf or .txt file, or drop it here")
                        .desired_width(ui.available_width() - 110.0);
                    let response = ui.add(edit);
                    labeled(&response, WidgetType::TextEdit, "File path");

                    let enter =
                        response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    let button = ui.add_enabled(
                        !self.path.trim().is_empty(),
                        egui::Button::new("Select").rounding(self.theme.button_rounding),
                    );
                    labeled(&button, WidgetType::Button, "Select file");

                    if button.clicked() || enter {
                        // The error is kept on the intake for display
                        let _ = self.intake.select(self.path.trim());
                    }
                });

                if let Some(file) = self.intake.selected() {
                    ui.add_space(self.theme.spacing_sm);
                    let text = format!("Selected: {} ({})", file.name, file.size_display());
                    let response = ui.label(RichText::new(&text).color(self.theme.text_secondary));
                    labeled(&response, WidgetType::Label, &text);
                }

                if let Some(error) = self.intake.error() {
                    ui.add_space(self.theme.spacing_sm);
                    let response = ui.label(RichText::new(error).color(self.theme.error));
                    labeled(&response, WidgetType::Label, &format!("Error: {}", error));
                }

                ui.add_space(self.theme.spacing);

                ui.vertical_centered(|ui| {
                    let uploading = self.intake.is_uploading();
                    let text = if uploading { "Processing..." } else { "Upload Document" };
                    let button = ui.add_enabled(
                        self.intake.can_upload(),
                        egui::Button::new(RichText::new(text).strong())
                            .fill(self.theme.primary)
                            .rounding(self.theme.button_rounding),
                    );
                    labeled(&button, WidgetType::Button, "Upload document");

                    if button.clicked() {
                        self.intake.upload();
                    }
                    if uploading {
                        ui.spinner();
                    }

                    ui.add_space(self.theme.spacing_sm);
                    ui.label(
                        RichText::new("Supported formats: PDF, TXT")
                            .small()
                            .color(self.theme.text_muted),
                    );
                    ui.label(
                        RichText::new("Maximum file size: 10MB")
                            .small()
                            .color(self.theme.text_muted),
                    );
                });
            });
    }

    fn take_dropped_file(&mut self, ui: &egui::Ui) {
        let dropped = ui.ctx().input(|i| {
            i.raw
                .dropped_files
                .iter()
                .find_map(|file| file.path.clone())
        });

        if let Some(path) = dropped {
            *self.path = path.display().to_string();
            let _ = self.intake.select(&path);
        }
    }
}

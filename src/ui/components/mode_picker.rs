//! Mode selection screen

use super::labeled;
use crate::session::Mode;
use crate::ui::theme::Theme;
use egui::{self, RichText, WidgetType};

/// What the user picked on the selector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickerAction {
    Select(Mode),
    NewDocument,
}

/// One card per [`Mode`]
pub struct ModePicker<'a> {
    document: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> ModePicker<'a> {
    pub fn new(document: Option<&'a str>, theme: &'a Theme) -> Self {
        Self { document, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) -> Option<PickerAction> {
        let mut action = None;

        ui.vertical_centered(|ui| {
            ui.heading(RichText::new("Document Ready").color(self.theme.text_primary));
            if let Some(document) = self.document {
                ui.label(RichText::new(document).color(self.theme.text_secondary));
            }
            ui.label(
                RichText::new("Choose your preferred learning mode").color(self.theme.text_muted),
            );
        });

        ui.add_space(self.theme.spacing_lg);

        ui.columns(Mode::ALL.len(), |columns| {
            for (column, mode) in columns.iter_mut().zip(Mode::ALL) {
                if self.show_card(column, mode) {
                    action = Some(PickerAction::Select(mode));
                }
            }
        });

        ui.add_space(self.theme.spacing_lg);

        ui.vertical_centered(|ui| {
            let response = ui.link("Upload a different document");
            labeled(&response, WidgetType::Link, "Upload a different document");
            if response.clicked() {
                action = Some(PickerAction::NewDocument);
            }
        });

        action
    }

    fn show_card(&self, ui: &mut egui::Ui, mode: Mode) -> bool {
        let info = mode.info();
        let mut clicked = false;

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.label(
                    RichText::new(info.title)
                        .size(18.0)
                        .strong()
                        .color(self.theme.text_primary),
                );
                ui.label(RichText::new(info.description).color(self.theme.text_muted));
                ui.add_space(self.theme.spacing_sm);

                for feature in info.features {
                    ui.label(
                        RichText::new(format!("• {}", feature))
                            .small()
                            .color(self.theme.text_secondary),
                    );
                }

                ui.add_space(self.theme.spacing_sm);
                let button = ui.add(
                    egui::Button::new("Get Started")
                        .fill(self.theme.primary)
                        .rounding(self.theme.button_rounding),
                );
                labeled(&button, WidgetType::Button, &format!("Start {}", info.title));
                clicked = button.clicked();
            });

        clicked
    }
}

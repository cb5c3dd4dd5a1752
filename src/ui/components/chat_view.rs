//! Chat screen: transcript with sources and a message box

use super::labeled;
use crate::messages::{source_preview, Message};
use crate::session::ChatSession;
use crate::ui::theme::Theme;
use egui::{self, Align, Color32, RichText, WidgetType};

/// Chat transcript and input bar
pub struct ChatView<'a> {
    session: &'a mut ChatSession,
    theme: &'a Theme,
}

impl<'a> ChatView<'a> {
    pub fn new(session: &'a mut ChatSession, theme: &'a Theme) -> Self {
        Self { session, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::TopBottomPanel::bottom("chat_input")
            .frame(egui::Frame::none().inner_margin(self.theme.spacing_sm))
            .show_inside(ui, |ui| self.show_input(ui));

        egui::ScrollArea::vertical()
            .id_salt("chat_messages")
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if self.session.transcript().is_empty() && !self.session.is_loading() {
                    show_empty_state(ui, self.theme);
                }

                for message in self.session.transcript() {
                    show_message(ui, message, self.theme);
                    ui.add_space(self.theme.spacing_sm);
                }

                if self.session.is_loading() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        let response =
                            ui.label(RichText::new("Thinking...").color(self.theme.text_muted));
                        labeled(&response, WidgetType::Label, "Thinking");
                    });
                }
            });
    }

    fn show_input(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let loading = self.session.is_loading();
            let edit = egui::TextEdit::singleline(&mut self.session.input)
                .hint_text("Ask a question about your document...")
                .desired_width(ui.available_width() - 80.0);
            let response = ui.add_enabled(!loading, edit);
            labeled(&response, WidgetType::TextEdit, "Message input");

            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let button = ui.add_enabled(
                self.session.can_send(),
                egui::Button::new("Send")
                    .fill(self.theme.primary)
                    .rounding(self.theme.button_rounding),
            );
            labeled(&button, WidgetType::Button, "Send message");

            if (button.clicked() || enter) && self.session.send() {
                response.request_focus();
            }
        });
    }
}

fn show_empty_state(ui: &mut egui::Ui, theme: &Theme) {
    ui.vertical_centered(|ui| {
        ui.add_space(60.0);
        ui.label(
            RichText::new("Start by asking a question about your document!")
                .size(16.0)
                .color(theme.text_secondary),
        );
        ui.label(
            RichText::new("Example: \"What is the main topic of this document?\"")
                .color(theme.text_muted),
        );
    });
}

/// Message bubble, aligned by role
pub(crate) fn show_message(ui: &mut egui::Ui, message: &Message, theme: &Theme) {
    let is_user = message.is_user();
    let (fill, text_color) = if message.is_error {
        (theme.error_bubble, theme.text_primary)
    } else if is_user {
        (theme.user_bubble, Color32::WHITE)
    } else {
        (theme.assistant_bubble, theme.text_primary)
    };
    let align = if is_user { Align::RIGHT } else { Align::LEFT };

    ui.with_layout(egui::Layout::top_down(align), |ui| {
        let max_width = ui.available_width() * 0.75;

        egui::Frame::none()
            .fill(fill)
            .rounding(theme.bubble_rounding)
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.set_max_width(max_width);

                let response = ui.label(RichText::new(&message.text).color(text_color));
                let label = if is_user {
                    format!("User message: {}", message.text)
                } else if message.is_error {
                    format!("Error message: {}", message.text)
                } else {
                    format!("Assistant message: {}", message.text)
                };
                labeled(&response, WidgetType::Label, &label);

                if !message.sources.is_empty() {
                    ui.separator();
                    ui.label(RichText::new("Sources:").small().strong().color(theme.text_muted));
                    for source in &message.sources {
                        ui.label(
                            RichText::new(source_preview(source))
                                .small()
                                .italics()
                                .color(theme.text_muted),
                        );
                    }
                }
            });

        ui.label(
            RichText::new(message.created_at.format("%H:%M").to_string())
                .size(10.0)
                .color(theme.text_muted),
        );
    });
}

//! Voice tutor screen
//!
//! Renders a [`VoiceSnapshot`] and reports button presses as
//! [`VoiceInput`]s; the app forwards them to the orchestrator.

use super::chat_view::show_message;
use super::labeled;
use crate::ui::theme::Theme;
use crate::voice::{VoiceMode, VoiceSnapshot};
use egui::{self, RichText, Sense, Vec2, WidgetType};

/// User actions on the voice screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoiceInput {
    StartListening,
    Stop,
    Reset,
    Submit(String),
}

pub struct VoiceView<'a> {
    snapshot: &'a VoiceSnapshot,
    typed: &'a mut String,
    theme: &'a Theme,
}

impl<'a> VoiceView<'a> {
    pub fn new(snapshot: &'a VoiceSnapshot, typed: &'a mut String, theme: &'a Theme) -> Self {
        Self {
            snapshot,
            typed,
            theme,
        }
    }

    pub fn show(mut self, ui: &mut egui::Ui) -> Option<VoiceInput> {
        let mut input = None;

        self.show_progress(ui);

        ui.vertical_centered(|ui| {
            self.show_orb(ui);
            ui.add_space(self.theme.spacing_sm);

            let mode = self.snapshot.mode;
            let response = ui.label(
                RichText::new(mode.title())
                    .size(20.0)
                    .strong()
                    .color(self.theme.text_primary),
            );
            labeled(&response, WidgetType::Label, &format!("Status: {}", mode.title()));
            ui.label(RichText::new(mode.hint()).color(self.theme.text_muted));

            if mode.is_listening() && !self.snapshot.live_text.trim().is_empty() {
                let text = self.snapshot.live_text.trim();
                let response =
                    ui.label(RichText::new(text).italics().color(self.theme.text_secondary));
                labeled(&response, WidgetType::Label, &format!("Heard: {}", text));
            }

            if let Some(error) = &self.snapshot.error {
                let response = ui.label(RichText::new(error).color(self.theme.error));
                labeled(&response, WidgetType::Label, &format!("Error: {}", error));
            }

            ui.add_space(self.theme.spacing_sm);
            ui.horizontal(|ui| {
                if let Some(action) = self.show_controls(ui) {
                    input = Some(action);
                }
            });
        });

        ui.separator();

        egui::TopBottomPanel::bottom("voice_text_input")
            .frame(egui::Frame::none().inner_margin(self.theme.spacing_sm))
            .show_inside(ui, |ui| {
                if let Some(action) = self.show_text_input(ui) {
                    input = Some(action);
                }
            });

        egui::ScrollArea::vertical()
            .id_salt("voice_messages")
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in &self.snapshot.messages {
                    show_message(ui, message, self.theme);
                    ui.add_space(self.theme.spacing_sm);
                }
            });

        if !mode_is_quiet(self.snapshot.mode) {
            ui.ctx().request_repaint();
        }

        input
    }

    fn show_progress(&self, ui: &mut egui::Ui) {
        let Some(progress) = self.snapshot.visible_progress() else {
            return;
        };

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(egui::Margin::symmetric(self.theme.spacing, self.theme.spacing_sm))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let accuracy = format!("Accuracy {:.0}%", progress.accuracy);
                    let response =
                        ui.label(RichText::new(&accuracy).strong().color(self.theme.success));
                    labeled(&response, WidgetType::Label, &accuracy);

                    ui.add_space(self.theme.spacing);

                    let score = format!(
                        "Score {}/{}",
                        progress.correct_answers, progress.questions_asked
                    );
                    let response = ui.label(
                        RichText::new(&score).strong().color(self.theme.text_primary),
                    );
                    labeled(&response, WidgetType::Label, &score);

                    if let Some(topic) = &progress.current_topic {
                        ui.add_space(self.theme.spacing);
                        ui.label(
                            RichText::new(format!("Topic: {}", topic))
                                .color(self.theme.text_muted),
                        );
                    }
                });
            });
        ui.add_space(self.theme.spacing_sm);
    }

    fn show_orb(&self, ui: &mut egui::Ui) {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(96.0), Sense::hover());
        if !ui.is_rect_visible(rect) {
            return;
        }

        let color = self.theme.mode_color(self.snapshot.mode);
        let painter = ui.painter();
        painter.circle_filled(rect.center(), 36.0, color);

        if !mode_is_quiet(self.snapshot.mode) {
            let t = ui.ctx().input(|i| i.time);
            let pulse = ((t * 3.0).sin() * 0.5 + 0.5) as f32;
            painter.circle_stroke(
                rect.center(),
                38.0 + pulse * 8.0,
                egui::Stroke::new(2.0, color.gamma_multiply(1.0 - pulse * 0.6)),
            );
        }
    }

    fn show_controls(&self, ui: &mut egui::Ui) -> Option<VoiceInput> {
        let mut action = None;

        if self.snapshot.mode.is_idle() {
            let button = ui.add_enabled(
                self.snapshot.capture_available,
                egui::Button::new(RichText::new("Start").strong())
                    .fill(self.theme.primary)
                    .rounding(self.theme.button_rounding),
            );
            labeled(&button, WidgetType::Button, "Start listening");
            if button.clicked() {
                action = Some(VoiceInput::StartListening);
            }
        } else {
            let button = ui.add(
                egui::Button::new(RichText::new("Stop").strong())
                    .fill(self.theme.error)
                    .rounding(self.theme.button_rounding),
            );
            labeled(&button, WidgetType::Button, "Stop");
            if button.clicked() {
                action = Some(VoiceInput::Stop);
            }
        }

        let button = ui.add(egui::Button::new("Reset").rounding(self.theme.button_rounding));
        labeled(&button, WidgetType::Button, "Reset session");
        if button.clicked() {
            action = Some(VoiceInput::Reset);
        }

        action
    }

    fn show_text_input(&mut self, ui: &mut egui::Ui) -> Option<VoiceInput> {
        let busy = self.snapshot.mode.is_loading();
        let mut action = None;

        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut *self.typed)
                .hint_text("Or type a message...")
                .desired_width(ui.available_width() - 80.0);
            let response = ui.add(edit);
            labeled(&response, WidgetType::TextEdit, "Voice text input");

            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let can_send = !busy && !self.typed.trim().is_empty();
            let button = ui.add_enabled(
                can_send,
                egui::Button::new("Send").rounding(self.theme.button_rounding),
            );
            labeled(&button, WidgetType::Button, "Send typed message");

            if can_send && (button.clicked() || enter) {
                action = Some(VoiceInput::Submit(self.typed.trim().to_string()));
                self.typed.clear();
            }
        });

        action
    }
}

/// Idle has nothing to animate
fn mode_is_quiet(mode: VoiceMode) -> bool {
    mode.is_idle()
}

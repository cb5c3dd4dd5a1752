//! Tutor screen: question, answer, scored feedback

use super::labeled;
use crate::api::Evaluation;
use crate::session::{ScoreTier, TutorSession};
use crate::ui::theme::Theme;
use egui::{self, RichText, WidgetType};

pub struct TutorView<'a> {
    session: &'a mut TutorSession,
    theme: &'a Theme,
}

impl<'a> TutorView<'a> {
    pub fn new(session: &'a mut TutorSession, theme: &'a Theme) -> Self {
        Self { session, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .id_salt("tutor_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.show_question(ui);
                ui.add_space(self.theme.spacing);
                self.show_answer(ui);

                if let Some(evaluation) = self.session.evaluation() {
                    ui.add_space(self.theme.spacing);
                    ui.separator();
                    show_evaluation(ui, evaluation, self.theme);
                }
            });
    }

    fn show_question(&mut self, ui: &mut egui::Ui) {
        let loading = self.session.is_question_loading();

        ui.horizontal(|ui| {
            ui.label(RichText::new("Question:").strong().color(self.theme.text_primary));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let text = if loading { "Loading..." } else { "New Question" };
                let button = ui.add_enabled(!loading, egui::Button::new(text));
                labeled(&button, WidgetType::Button, "New question");
                if button.clicked() {
                    self.session.new_question();
                }
            });
        });

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                if loading {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(
                            RichText::new("Generating question...").color(self.theme.text_muted),
                        );
                    });
                } else {
                    let question = self.session.question();
                    let response = ui.label(RichText::new(question).color(self.theme.text_primary));
                    labeled(&response, WidgetType::Label, &format!("Question: {}", question));
                }
            });
    }

    fn show_answer(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Your Answer:").strong().color(self.theme.text_primary));

        let busy = self.session.is_evaluating() || self.session.is_question_loading();
        let edit = egui::TextEdit::multiline(&mut self.session.answer)
            .hint_text("Type your answer here...")
            .desired_rows(4)
            .desired_width(f32::INFINITY);
        let response = ui.add_enabled(!busy, edit);
        labeled(&response, WidgetType::TextEdit, "Answer input");

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
            let text = if self.session.is_evaluating() {
                "Evaluating..."
            } else {
                "Submit Answer"
            };
            let button = ui.add_enabled(
                self.session.can_submit(),
                egui::Button::new(text)
                    .fill(self.theme.success)
                    .rounding(self.theme.button_rounding),
            );
            labeled(&button, WidgetType::Button, "Submit answer");
            if button.clicked() {
                self.session.submit();
            }
        });
    }
}

fn show_evaluation(ui: &mut egui::Ui, evaluation: &Evaluation, theme: &Theme) {
    ui.label(RichText::new("Evaluation:").strong().color(theme.text_primary));

    let color = theme.tier_color(ScoreTier::for_score(evaluation.score));
    egui::Frame::none()
        .fill(color.gamma_multiply(0.2))
        .rounding(theme.bubble_rounding)
        .inner_margin(egui::Margin::symmetric(12.0, 4.0))
        .show(ui, |ui| {
            let text = format!("Score: {}/10", evaluation.score);
            let response = ui.label(RichText::new(&text).strong().color(color));
            labeled(&response, WidgetType::Label, &text);
        });

    ui.add_space(theme.spacing_sm);

    ui.columns(2, |columns| {
        point_list(
            &mut columns[0],
            "✓ What's Correct:",
            &evaluation.correct_points,
            "No specific correct points identified",
            theme.success,
            theme,
        );
        point_list(
            &mut columns[1],
            "✗ What's Missing/Wrong:",
            &evaluation.missing_points,
            "No missing points identified",
            theme.error,
            theme,
        );
    });

    if !evaluation.improved_answer.is_empty() {
        ui.add_space(theme.spacing_sm);
        egui::Frame::none()
            .fill(theme.bg_secondary)
            .rounding(theme.card_rounding)
            .inner_margin(theme.spacing)
            .show(ui, |ui| {
                ui.label(RichText::new("💡 Improved Answer:").strong().color(theme.primary));
                let response = ui.label(
                    RichText::new(&evaluation.improved_answer).color(theme.text_secondary),
                );
                labeled(
                    &response,
                    WidgetType::Label,
                    &format!("Improved answer: {}", evaluation.improved_answer),
                );
            });
    }
}

fn point_list(
    ui: &mut egui::Ui,
    title: &str,
    points: &[String],
    empty: &str,
    color: egui::Color32,
    theme: &Theme,
) {
    ui.label(RichText::new(title).strong().color(color));
    if points.is_empty() {
        ui.label(RichText::new(empty).italics().color(theme.text_muted));
    }
    for point in points {
        ui.label(RichText::new(format!("• {}", point)).color(theme.text_secondary));
    }
}

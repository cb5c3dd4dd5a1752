//! Main application struct and eframe integration

use crate::api::ApiHandle;
use crate::config::AppConfig;
use crate::session::{
    ChatSession, DocumentIntake, IntakeOutcome, Mode, Navigator, Screen, ServiceStatus,
    TutorSession,
};
use crate::ui::components::{
    labeled, ChatView, ModePicker, PickerAction, TutorView, UploadPanel, VoiceInput, VoiceView,
};
use crate::ui::theme::Theme;
use crate::voice::{new_session_id, VoiceDevices, VoiceHandle, VoiceOrchestrator};
use egui::{self, CentralPanel, RichText, TopBottomPanel};
use std::time::Duration;
use tracing::{debug, info};

/// How often to repaint while waiting on background work
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Live voice session owned by the voice screen
struct VoiceScreen {
    handle: VoiceHandle,
    typed: String,
}

impl Drop for VoiceScreen {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

/// State of the screen currently shown
enum View {
    Intake {
        intake: DocumentIntake,
        path: String,
    },
    Modes,
    Chat(ChatSession),
    Tutor(TutorSession),
    Voice(VoiceScreen),
}

impl View {
    fn screen(&self) -> Screen {
        match self {
            View::Intake { .. } => Screen::Intake,
            View::Modes => Screen::ModeSelect,
            View::Chat(_) => Screen::Chat,
            View::Tutor(_) => Screen::Tutor,
            View::Voice(_) => Screen::Voice,
        }
    }
}

/// Root of the document tutor UI
pub struct DocTutorApp {
    config: AppConfig,
    api: ApiHandle,
    theme: Theme,
    navigator: Navigator,
    view: View,
    status: ServiceStatus,
}

impl DocTutorApp {
    /// Create the app on the eframe creation context
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, api: ApiHandle) -> Self {
        let app = Self::headless(config, api);
        app.theme.apply(&cc.egui_ctx);
        app
    }

    /// Create the app without a window, e.g. for tests
    pub fn headless(config: AppConfig, api: ApiHandle) -> Self {
        let theme = Theme::from_choice(config.ui.theme);
        let status = ServiceStatus::new(api.fork());
        let view = View::Intake {
            intake: DocumentIntake::new(api.fork()),
            path: String::new(),
        };

        Self {
            config,
            api,
            theme,
            navigator: Navigator::new(),
            view,
            status,
        }
    }

    pub fn screen(&self) -> Screen {
        self.navigator.screen()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Rebuild the view when the navigator moved to another screen
    fn sync_view(&mut self) {
        let screen = self.navigator.screen();
        if self.view.screen() == screen {
            return;
        }

        debug!("Building view for {}", screen);
        self.view = match screen {
            Screen::Intake => View::Intake {
                intake: DocumentIntake::new(self.api.fork()),
                path: String::new(),
            },
            Screen::ModeSelect => View::Modes,
            Screen::Chat => View::Chat(ChatSession::new(self.api.fork())),
            Screen::Tutor => View::Tutor(TutorSession::new(self.api.fork())),
            Screen::Voice => View::Voice(self.start_voice()),
        };
    }

    fn start_voice(&self) -> VoiceScreen {
        let voice_api = self.api.fork();
        let devices = VoiceDevices::detect(&self.config.voice, &voice_api);
        let session_id = new_session_id();
        info!("Starting voice session {}", session_id);

        let (handle, orchestrator) =
            VoiceOrchestrator::new(&self.config.voice, session_id, voice_api, devices);
        orchestrator.start();

        VoiceScreen {
            handle,
            typed: String::new(),
        }
    }

    fn new_document(&mut self) {
        self.status.clear_document();
        self.navigator.new_document();
    }

    /// Apply finished background work; true when something changed
    fn poll(&mut self) -> bool {
        let mut changed = self.status.poll();

        match &mut self.view {
            View::Intake { intake, .. } => {
                if let Some(IntakeOutcome::Uploaded { file_name, chunk_count }) = intake.poll() {
                    info!("{} ready ({} chunks)", file_name, chunk_count);
                    self.navigator.upload_succeeded(file_name);
                    self.status.refresh();
                    changed = true;
                }
            }
            View::Chat(chat) => changed |= chat.poll(),
            View::Tutor(tutor) => changed |= tutor.poll(),
            View::Modes | View::Voice(_) => {}
        }

        changed
    }

    fn is_busy(&self) -> bool {
        match &self.view {
            View::Intake { intake, .. } => intake.is_uploading(),
            View::Chat(chat) => chat.is_loading(),
            View::Tutor(tutor) => tutor.is_question_loading() || tutor.is_evaluating(),
            View::Voice(_) => true,
            View::Modes => self.status.is_online().is_none(),
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_secondary)
                    .inner_margin(12.0),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Document Tutor + Chatbot")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    let subtitle = match self.navigator.screen().mode() {
                        Some(mode) => mode.info().title.to_string(),
                        None => "Upload a document and choose a learning mode".to_string(),
                    };
                    ui.label(RichText::new(subtitle).color(self.theme.text_muted));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let online = self.status.is_online();
                        let color = match online {
                            Some(true) => self.theme.success,
                            Some(false) => self.theme.error,
                            None => self.theme.text_muted,
                        };
                        ui.label(RichText::new(self.status.summary()).small().color(color));

                        if self.navigator.screen().mode().is_some() {
                            let button = ui.button("New Document");
                            labeled(
                                &button,
                                egui::WidgetType::Button,
                                "New document",
                            );
                            if button.clicked() {
                                self.new_document();
                            }

                            let button = ui.button("← Back");
                            labeled(
                                &button,
                                egui::WidgetType::Button,
                                "Back to modes",
                            );
                            if button.clicked() {
                                self.navigator.back_to_modes();
                            }
                        }
                    });
                });
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        let theme = &self.theme;
        let mut picked = None;
        let mut voice_input = None;
        let mut resume_loaded = false;

        CentralPanel::default()
            .frame(
                egui::Frame::none()
                    .fill(theme.bg_primary)
                    .inner_margin(theme.spacing),
            )
            .show(ctx, |ui| match &mut self.view {
                View::Intake { intake, path } => {
                    UploadPanel::new(intake, path, theme).show(ui);

                    if self.status.document_loaded() && !intake.is_uploading() {
                        ui.add_space(theme.spacing);
                        ui.vertical_centered(|ui| {
                            let text = format!(
                                "Continue with the document already loaded ({} chunks)",
                                self.status.chunk_count()
                            );
                            let link = ui.link(&text);
                            labeled(
                                &link,
                                egui::WidgetType::Link,
                                "Continue with loaded document",
                            );
                            resume_loaded = link.clicked();
                        });
                    }
                }
                View::Modes => {
                    picked = ModePicker::new(self.navigator.document(), theme).show(ui);
                }
                View::Chat(chat) => ChatView::new(chat, theme).show(ui),
                View::Tutor(tutor) => TutorView::new(tutor, theme).show(ui),
                View::Voice(voice) => {
                    let snapshot = voice.handle.snapshot();
                    voice_input = VoiceView::new(&snapshot, &mut voice.typed, theme).show(ui);
                }
            });

        if resume_loaded {
            self.navigator.upload_succeeded("Loaded document");
        }

        match picked {
            Some(PickerAction::Select(mode)) => {
                self.navigator.select_mode(mode);
            }
            Some(PickerAction::NewDocument) => self.new_document(),
            None => {}
        }

        if let (Some(input), View::Voice(voice)) = (voice_input, &self.view) {
            match input {
                VoiceInput::StartListening => voice.handle.start_listening(),
                VoiceInput::Stop => voice.handle.stop(),
                VoiceInput::Reset => voice.handle.reset(),
                VoiceInput::Submit(text) => voice.handle.submit_text(text),
            }
        }
    }

    /// Mode of the active interaction view
    pub fn active_mode(&self) -> Option<Mode> {
        self.view.screen().mode()
    }

    /// Run one frame: apply background results, then draw
    pub fn show(&mut self, ctx: &egui::Context) {
        self.sync_view();
        if self.poll() {
            ctx.request_repaint();
        }
        self.sync_view();

        self.show_header(ctx);
        self.show_content(ctx);
        self.sync_view();

        if self.is_busy() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}

impl eframe::App for DocTutorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("DocTutor shutting down");
        // Dropping the voice screen stops its orchestrator
        self.view = View::Modes;
        self.api.shutdown();
    }
}

//! Desktop UI: header with the quote banner, history sidebar, conversation view, input row
//! and the summary overlay. All state transitions go through [`ChatState`]; this file only
//! draws it and moves proxy calls onto worker threads.

use eframe::egui;
use lib::client::{self, ClientError, ProxyClient};
use lib::conversation::{ChatState, Message, Sender, SummaryState, TurnPhase};
use lib::export::{self, PageLayout};
use lib::render::{self, Block, Span};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

const CHAT_INPUT_HEIGHT: f32 = 72.0;
const PANEL_MARGIN: f32 = 24.0;
const LIST_MARKER_WIDTH: f32 = 16.0;

const DISCLAIMER: &str = "Disclaimer: for informational purposes only. Always confirm advice and \
procedures with certified Porsche resources; you act on the information here at your own risk. \
Not affiliated with, endorsed by, or associated with Dr. Ing. h.c. F. Porsche AG or any other \
Porsche entity.";

/// Result of a proxy call, tagged with the generation it was issued under.
type CallResult = (u64, Result<String, ClientError>);

pub struct AirCooledApp {
    state: ChatState,
    client: ProxyClient,
    layout: PageLayout,
    turn_receiver: Option<mpsc::Receiver<CallResult>>,
    summary_receiver: Option<mpsc::Receiver<CallResult>>,
    /// Outcome of the last export, shown in the overlay.
    export_status: Option<Result<PathBuf, String>>,
}

impl AirCooledApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let config = match lib::config::load_config(None) {
            Ok((config, _)) => config,
            Err(e) => {
                log::warn!("could not load config, using defaults: {:#}", e);
                lib::config::Config::default()
            }
        };
        let client = ProxyClient::from_config(&config.client, None);
        log::info!("using proxy at {}", client.base_url());
        Self {
            state: ChatState::new(),
            client,
            layout: PageLayout::from(&config.client),
            turn_receiver: None,
            summary_receiver: None,
            export_status: None,
        }
    }

    /// Send the input as a chat turn on a worker thread. No-op for blank input or while waiting.
    fn start_turn(&mut self) {
        let Some(req) = self.state.send_turn() else {
            return;
        };
        let proxy = self.client.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = client::block_on(proxy.submit_turn(&req.messages));
            let _ = tx.send((req.generation, result));
        });
        self.turn_receiver = Some(rx);
    }

    fn start_summary(&mut self) {
        let req = self.state.request_summary();
        self.export_status = None;
        let proxy = self.client.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = client::block_on(proxy.summarize(&req.messages));
            let _ = tx.send((req.generation, result));
        });
        self.summary_receiver = Some(rx);
    }

    /// Poll for the chat reply and clear the receiver when done. Call each frame.
    fn poll_turn(&mut self) {
        if let Some(rx) = &self.turn_receiver {
            match rx.try_recv() {
                Ok((generation, result)) => {
                    self.turn_receiver = None;
                    self.state.receive_reply(generation, result);
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.turn_receiver = None;
                    if let TurnPhase::AwaitingReply { generation } = self.state.turn() {
                        self.state.receive_reply(
                            generation,
                            Err(ClientError::Decode("worker stopped without a reply".to_string())),
                        );
                    }
                }
            }
        }
    }

    fn poll_summary(&mut self) {
        if let Some(rx) = &self.summary_receiver {
            match rx.try_recv() {
                Ok((generation, result)) => {
                    self.summary_receiver = None;
                    self.state.receive_summary(generation, result);
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.summary_receiver = None;
                    if let SummaryState::Loading { generation } = *self.state.summary() {
                        let stopped =
                            ClientError::Decode("worker stopped without a summary".to_string());
                        self.state.receive_summary(generation, Err(stopped));
                    }
                }
            }
        }
    }

    /// Ask for a destination and write the paginated summary there.
    fn export_summary(&mut self) {
        let Some(doc) = self.state.export_document(&self.layout) else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_title("Export summary")
            .set_file_name(export::default_file_name())
            .add_filter("Text", &["txt"])
            .save_file()
        else {
            return;
        };
        self.export_status = Some(match doc.write_to(&path) {
            Ok(()) => {
                log::info!("exported {} page(s) to {}", doc.pages().len(), path.display());
                Ok(path)
            }
            Err(e) => {
                log::error!("export failed: {:#}", e);
                Err(format!("Export failed: {:#}", e))
            }
        });
    }

    fn ui_history(&mut self, ui: &mut egui::Ui) {
        ui.add_space(PANEL_MARGIN);
        ui.heading("History");
        ui.add_space(8.0);
        if ui.button("New conversation").clicked() {
            self.state.new_conversation();
        }
        ui.add_space(8.0);
        ui.separator();
        if self.state.history().is_empty() {
            ui.label(egui::RichText::new("No saved conversations yet.").weak());
            return;
        }
        let mut selected = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            let active = self.state.active_history_id();
            for h in self.state.history() {
                let is_active = active == Some(h.id.as_str());
                let label = format!("{}  {}", h.saved_at, h.title);
                if ui.selectable_label(is_active, label).clicked() {
                    selected = Some(h.id.clone());
                }
            }
        });
        if let Some(id) = selected {
            self.state.load_history_entry(&id);
        }
    }

    fn ui_input(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        if let Some(err) = self.state.turn_error() {
            ui.colored_label(egui::Color32::RED, err);
            ui.add_space(4.0);
        }
        let awaiting = self.state.is_awaiting_reply();
        let response = ui.add_sized(
            [ui.available_width(), CHAT_INPUT_HEIGHT],
            egui::TextEdit::multiline(&mut self.state.input).hint_text(
                "Describe the car, the symptom and when it happens (Ctrl+Enter to send)",
            ),
        );
        ui.add_space(6.0);

        let mut send_now = false;
        let mut summarize = false;
        let mut new_conversation = false;
        ui.horizontal(|ui| {
            let can_send = !awaiting && !self.state.input.trim().is_empty();
            if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                send_now = true;
            }
            if ui.button("Summarize").clicked() {
                summarize = true;
            }
            if ui.button("New conversation").clicked() {
                new_conversation = true;
            }
            if awaiting {
                ui.spinner();
                ui.label("Thinking...");
            }
        });
        if response.has_focus() {
            let modifiers = ui.input(|i| i.modifiers);
            if (modifiers.command || modifiers.ctrl)
                && ui.input(|i| i.key_pressed(egui::Key::Enter))
            {
                send_now = true;
            }
        }
        if send_now {
            self.start_turn();
        }
        if summarize {
            self.start_summary();
        }
        if new_conversation {
            self.state.new_conversation();
        }
        ui.add_space(8.0);
    }

    fn ui_messages(&mut self, ui: &mut egui::Ui) {
        let scroll = self.state.take_scroll_request();
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.add_space(12.0);
                if self.state.messages().is_empty() {
                    ui.label(
                        egui::RichText::new(
                            "Ask about your air-cooled Porsche: model, year and what it is doing.",
                        )
                        .weak(),
                    );
                }
                for m in self.state.messages() {
                    render_chat_message(ui, m);
                    ui.add_space(8.0);
                }
                if self.state.is_awaiting_reply() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new("The assistant is typing...").weak());
                    });
                }
                if scroll {
                    ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                }
            });
    }

    /// Summary overlay: loading, report or error, with Export and Close.
    fn ui_summary_window(&mut self, ctx: &egui::Context) {
        let mut export = false;
        let mut close = false;
        egui::Window::new("Diagnostic summary")
            .collapsible(false)
            .resizable(true)
            .default_size([640.0, 520.0])
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                match self.state.summary() {
                    SummaryState::Loading { .. } => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Generating summary...");
                        });
                    }
                    SummaryState::Ready(text) => {
                        egui::ScrollArea::vertical()
                            .max_height(420.0)
                            .show(ui, |ui| {
                                for block in render::render_markdown(text) {
                                    render_block(ui, &block);
                                }
                            });
                    }
                    SummaryState::Failed(msg) => {
                        ui.colored_label(egui::Color32::RED, msg.as_str());
                    }
                    SummaryState::Hidden => {}
                }
                match &self.export_status {
                    Some(Ok(path)) => {
                        ui.add_space(6.0);
                        ui.label(format!("Saved to {}", path.display()));
                    }
                    Some(Err(e)) => {
                        ui.add_space(6.0);
                        ui.colored_label(egui::Color32::RED, e.as_str());
                    }
                    None => {}
                }
                ui.separator();
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(self.state.can_export(), egui::Button::new("Export"))
                        .clicked()
                    {
                        export = true;
                    }
                    if ui.button("Close").clicked() {
                        close = true;
                    }
                });
            });
        if export {
            self.export_summary();
        }
        if close {
            self.state.close_summary();
            self.summary_receiver = None;
            self.export_status = None;
        }
    }
}

/// One message in a framed bubble; user and quote text literal, assistant text rich.
fn render_chat_message(ui: &mut egui::Ui, m: &Message) {
    let is_user = m.sender == Sender::User;
    let frame = egui::Frame::none()
        .fill(if is_user {
            ui.style().visuals.extreme_bg_color
        } else {
            ui.style().visuals.panel_fill
        })
        .stroke(egui::Stroke::new(
            1.0,
            ui.style().visuals.widgets.noninteractive.bg_stroke.color,
        ))
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(8.0));

    frame.show(ui, |ui| {
        ui.set_width(ui.available_width());
        match m.sender {
            Sender::User => {
                ui.label(egui::RichText::new(&m.text).strong());
            }
            Sender::Quote => {
                ui.label(egui::RichText::new(&m.text).italics());
            }
            Sender::Assistant => {
                for block in render::render_message(m) {
                    render_block(ui, &block);
                }
            }
        }
    });
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 22.0,
        2 => 19.0,
        3 => 17.0,
        _ => 15.0,
    }
}

fn render_block(ui: &mut egui::Ui, block: &Block) {
    match block {
        Block::Paragraph(spans) => {
            ui.horizontal_wrapped(|ui| add_spans(ui, spans, None));
        }
        Block::Heading { level, spans } => {
            ui.add_space(4.0);
            ui.horizontal_wrapped(|ui| add_spans(ui, spans, Some(heading_size(*level))));
        }
        Block::ListItem {
            depth,
            marker,
            spans,
        } => {
            ui.horizontal_wrapped(|ui| {
                ui.add_space(14.0 * (*depth as f32 + 1.0));
                let bullet = match marker {
                    Some(n) => format!("{}. ", n),
                    None => "• ".to_string(),
                };
                ui.label(bullet);
                add_spans(ui, spans, None);
            });
        }
        Block::ListContinuation { depth, spans } => {
            ui.add_space(2.0);
            ui.horizontal_wrapped(|ui| {
                // Past the marker column so the text sits under its item.
                ui.add_space(14.0 * (*depth as f32 + 1.0) + LIST_MARKER_WIDTH);
                add_spans(ui, spans, None);
            });
        }
        Block::Code(code) => {
            egui::Frame::none()
                .fill(ui.style().visuals.extreme_bg_color)
                .rounding(egui::Rounding::same(4.0))
                .inner_margin(egui::Margin::same(6.0))
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(code).family(egui::FontFamily::Monospace));
                });
        }
        Block::Rule => {
            ui.separator();
        }
        Block::Literal(text) => {
            ui.label(text.as_str());
        }
    }
}

/// Inline spans laid out in a wrapping row. Links always open in a new browser tab.
fn add_spans(ui: &mut egui::Ui, spans: &[Span], heading: Option<f32>) {
    ui.spacing_mut().item_spacing.x = 0.0;
    for span in spans {
        match span {
            Span::Text { text, style } => {
                let mut rich = egui::RichText::new(text);
                if let Some(size) = heading {
                    rich = rich.size(size).strong();
                }
                if style.strong {
                    rich = rich.strong();
                }
                if style.emphasis {
                    rich = rich.italics();
                }
                if style.code {
                    rich = rich.code();
                }
                ui.label(rich);
            }
            Span::Link { text, url } => {
                ui.add(
                    egui::Hyperlink::from_label_and_url(text.as_str(), url).open_in_new_tab(true),
                )
                .on_hover_text(url.as_str());
            }
        }
    }
}

impl eframe::App for AirCooledApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_turn();
        self.poll_summary();
        if self.turn_receiver.is_some() || self.summary_receiver.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        let overlay_open = *self.state.summary() != SummaryState::Hidden;

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.set_enabled(!overlay_open);
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(PANEL_MARGIN, 0.0))
                .show(ui, |ui| {
                    ui.add_space(12.0);
                    ui.horizontal(|ui| {
                        let toggle = if self.state.sidebar_open() {
                            "Hide history"
                        } else {
                            "History"
                        };
                        if ui.button(toggle).clicked() {
                            self.state.toggle_sidebar();
                        }
                        ui.add_space(8.0);
                        ui.heading("AIr-Cooled Answers");
                    });
                    ui.add_space(6.0);
                    ui.label(egui::RichText::new(&self.state.banner().text).italics());
                    ui.add_space(12.0);
                });
        });

        if self.state.sidebar_open() {
            egui::SidePanel::left("history_panel")
                .resizable(true)
                .default_width(240.0)
                .show(ctx, |ui| {
                    ui.set_enabled(!overlay_open);
                    self.ui_history(ui);
                });
        }

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.label(egui::RichText::new(DISCLAIMER).small().weak());
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("input_panel").show(ctx, |ui| {
            ui.set_enabled(!overlay_open);
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(PANEL_MARGIN, 0.0))
                .show(ui, |ui| self.ui_input(ui));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.set_enabled(!overlay_open);
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(PANEL_MARGIN, 0.0))
                .show(ui, |ui| self.ui_messages(ui));
        });

        if overlay_open {
            self.ui_summary_window(ctx);
        }
    }
}

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::mpsc;

use eframe::egui;

use retouch_ai::ai::{EditOutcome, EditService, GeminiService};
use retouch_ai::config::Config;
use retouch_ai::error::RetouchError;
use retouch_ai::inline::InlineImage;
use retouch_ai::session::{GenerateTicket, Session, SourceTicket};

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1100.0, 720.0])
        .with_min_inner_size([800.0, 500.0])
        .with_drag_and_drop(true);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "retouch-ai",
        options,
        Box::new(|cc| Ok(Box::new(App::new(cc)))),
    )
}

// ── Messages sent from background tasks to the UI ───────────────────

enum BgMessage {
    /// A source image finished loading (fetch or file read).
    SourceLoaded(SourceTicket, Result<InlineImage, RetouchError>),
    /// A generation attempt finished.
    EditFinished(GenerateTicket, anyhow::Result<EditOutcome>),
}

// ── Tabs ────────────────────────────────────────────────────────────

#[derive(PartialEq, Clone, Copy)]
enum Tab {
    Edit,
    Settings,
}

// ── Main application state ──────────────────────────────────────────

struct App {
    config: Config,
    config_path: Option<PathBuf>,
    session: Session,
    tab: Tab,
    status: String,
    rx: mpsc::Receiver<BgMessage>,
    tx: mpsc::Sender<BgMessage>,
    /// Tokio runtime for async tasks.
    rt: tokio::runtime::Runtime,
    client: reqwest::Client,
    source_texture: Option<egui::TextureHandle>,
    edited_texture: Option<egui::TextureHandle>,
    source_dirty: bool,
    edited_dirty: bool,
}

impl App {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let (tx, rx) = mpsc::channel();
        let config = Config::load(None).unwrap_or_default();

        let mut session = Session::new();
        session.prompt = config.default_prompt.clone();

        let mut app = Self {
            config,
            config_path: None,
            session,
            tab: Tab::Edit,
            status: "Loading default image...".into(),
            rx,
            tx,
            rt: tokio::runtime::Runtime::new().expect("Failed to create tokio runtime"),
            client: reqwest::Client::new(),
            source_texture: None,
            edited_texture: None,
            source_dirty: false,
            edited_dirty: false,
        };

        let url = app.config.default_image_url.clone();
        app.start_source_fetch(url);
        app
    }

    fn start_source_fetch(&mut self, url: String) {
        let ticket = self.session.begin_source_load();
        self.status = "Loading source image...".into();

        let client = self.client.clone();
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let result = InlineImage::fetch(&client, &url).await;
            let _ = tx.send(BgMessage::SourceLoaded(ticket, result));
        });
    }

    fn start_source_read(&mut self, path: PathBuf) {
        let ticket = self.session.begin_source_load();
        self.status = format!("Reading {}...", path.display());

        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let _ = tx.send(BgMessage::SourceLoaded(ticket, InlineImage::from_path(&path)));
        });
    }

    fn open_image(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "gif", "bmp"])
            .pick_file()
        {
            self.start_source_read(path);
        }
    }

    fn start_generate(&mut self) {
        let service = match GeminiService::from_config(&self.config.gemini) {
            Ok(service) => service,
            Err(e) => {
                self.session.error = Some(e.to_string());
                return;
            }
        };

        let request = match self.session.begin_generate() {
            Ok(request) => request,
            // validation error is already recorded in the session
            Err(_) => return,
        };
        self.status = format!("Asking {} for the edit...", service.name());

        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let result = service
                .edit(&request.image.data, &request.image.mime_type, &request.prompt)
                .await;
            let _ = tx.send(BgMessage::EditFinished(request.ticket, result));
        });
    }

    fn poll_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgMessage::SourceLoaded(ticket, result) => {
                    if self.session.finish_source_load(ticket, result) {
                        self.source_dirty = true;
                        self.edited_dirty = true;
                        self.status = if self.session.error.is_none() {
                            "Source image ready".into()
                        } else {
                            "Source load failed".into()
                        };
                    }
                }
                BgMessage::EditFinished(ticket, result) => {
                    if self.session.finish_generate(ticket, result) {
                        self.edited_dirty = true;
                        self.status = if self.session.error.is_none() {
                            "Done".into()
                        } else {
                            "Generation failed".into()
                        };
                    }
                }
            }
        }
    }

    fn rebuild_textures(&mut self, ctx: &egui::Context) {
        if self.source_dirty {
            self.source_texture = self
                .session
                .source
                .as_ref()
                .and_then(|inline| texture_from_inline(ctx, "source", inline));
            self.source_dirty = false;
        }
        if self.edited_dirty {
            self.edited_texture = self
                .session
                .edited_image
                .as_deref()
                .and_then(InlineImage::from_data_uri)
                .and_then(|inline| texture_from_inline(ctx, "edited", &inline));
            self.edited_dirty = false;
        }
    }
}

/// Decode an inline payload into a GPU texture for display.
fn texture_from_inline(
    ctx: &egui::Context,
    name: &str,
    inline: &InlineImage,
) -> Option<egui::TextureHandle> {
    let bytes = inline.decode().ok()?;
    let decoded = image::load_from_memory(&bytes).ok()?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.as_flat_samples();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
    Some(ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR))
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();
        self.rebuild_textures(ctx);

        // Request repaint while an operation is in flight so we pick up messages
        if self.session.loading {
            ctx.request_repaint();
        }

        // A dropped file acts like an upload
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if let Some(path) = dropped.into_iter().next() {
            self.start_source_read(path);
        }

        // ── Top bar ─────────────────────────────────────────────────
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("retouch-ai");
                ui.separator();

                let edit_tab = ui.selectable_label(self.tab == Tab::Edit, "🖼 Edit");
                let settings_tab = ui.selectable_label(self.tab == Tab::Settings, "⚙ Settings");
                if edit_tab.clicked() {
                    self.tab = Tab::Edit;
                }
                if settings_tab.clicked() {
                    self.tab = Tab::Settings;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.session.loading {
                        ui.spinner();
                    }
                    ui.label(&self.status);
                });
            });
        });

        match self.tab {
            Tab::Edit => self.show_edit_tab(ctx),
            Tab::Settings => self.show_settings_tab(ctx),
        }
    }
}

// ── Edit tab ────────────────────────────────────────────────────────

impl App {
    fn show_edit_tab(&mut self, ctx: &egui::Context) {
        // ── Bottom panel: prompt + controls ─────────────────────────
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);

            if let Some(ref err) = self.session.error {
                ui.colored_label(
                    egui::Color32::from_rgb(220, 50, 50),
                    format!("Error: {err}"),
                );
                ui.add_space(4.0);
            }

            ui.horizontal(|ui| {
                let prompt_edit = egui::TextEdit::multiline(&mut self.session.prompt)
                    .desired_rows(2)
                    .desired_width(ui.available_width() - 130.0)
                    .hint_text("e.g. 'Change the background to a sunset over the ocean'");
                ui.add_enabled(!self.session.loading, prompt_edit);

                let can_generate = !self.session.loading && !self.session.prompt.is_empty();
                if ui
                    .add_enabled(can_generate, egui::Button::new("✨ Generate"))
                    .clicked()
                {
                    self.start_generate();
                }
            });

            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!self.session.loading, egui::Button::new("📂 Open Image"))
                    .clicked()
                {
                    self.open_image();
                }
                if ui
                    .add_enabled(!self.session.loading, egui::Button::new("⟲ Default Image"))
                    .clicked()
                {
                    let url = self.config.default_image_url.clone();
                    self.start_source_fetch(url);
                }
                ui.label(
                    egui::RichText::new("or drop an image anywhere in the window")
                        .color(egui::Color32::GRAY),
                );
            });
            ui.add_space(6.0);
        });

        // ── Central panel: source and edited panes ──────────────────
        egui::CentralPanel::default().show(ctx, |ui| {
            let loading = self.session.loading;
            let pane_height = ui.available_height()
                - if self.session.response_text.is_empty() { 0.0 } else { 80.0 };

            ui.columns(2, |columns| {
                image_pane(
                    &mut columns[0],
                    "Source",
                    self.source_texture.as_ref(),
                    loading && self.session.source.is_none(),
                    "Drop an image or click Open Image",
                    pane_height,
                );
                image_pane(
                    &mut columns[1],
                    "Edited",
                    self.edited_texture.as_ref(),
                    loading && self.session.source.is_some(),
                    "The edited image will appear here",
                    pane_height,
                );
            });

            if !self.session.response_text.is_empty() {
                ui.separator();
                ui.label(egui::RichText::new("Model commentary").strong());
                ui.label(&self.session.response_text);
            }
        });
    }

    fn show_settings_tab(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Configuration");
                ui.add_space(8.0);

                // Config file path
                ui.horizontal(|ui| {
                    ui.label("Config file:");
                    if let Some(ref path) = self.config_path {
                        ui.label(path.display().to_string());
                    } else {
                        ui.label("(default)");
                    }
                    if ui.button("Load...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("JSON", &["json"])
                            .pick_file()
                        {
                            match Config::load(Some(&path)) {
                                Ok(c) => {
                                    self.config = c;
                                    self.config_path = Some(path);
                                    self.status = "Config loaded".into();
                                }
                                Err(e) => {
                                    self.status = format!("Failed to load config: {e}");
                                }
                            }
                        }
                    }
                    if ui.button("Save").clicked() {
                        let path = self.config_path.as_deref();
                        match self.config.save(path) {
                            Ok(()) => self.status = "Config saved".into(),
                            Err(e) => self.status = format!("Failed to save config: {e}"),
                        }
                    }
                });

                ui.add_space(16.0);
                ui.separator();

                // ── Gemini ──────────────────────────────────────────
                ui.add_space(8.0);
                ui.heading("Gemini");
                ui.add_space(4.0);

                ui.horizontal(|ui| {
                    ui.label("API Key:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.config.gemini.api_key)
                            .password(true),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("Model:");
                    ui.text_edit_singleline(&mut self.config.gemini.model);
                });
                ui.label(
                    egui::RichText::new(
                        "Leave the key empty to use the GEMINI_API_KEY environment variable.",
                    )
                    .small()
                    .color(egui::Color32::GRAY),
                );

                ui.add_space(16.0);
                ui.separator();

                // ── Startup ─────────────────────────────────────────
                ui.add_space(8.0);
                ui.heading("Startup");
                ui.add_space(4.0);

                ui.horizontal(|ui| {
                    ui.label("Default image URL:");
                    ui.text_edit_singleline(&mut self.config.default_image_url);
                });
                ui.horizontal(|ui| {
                    ui.label("Default prompt:");
                    ui.text_edit_singleline(&mut self.config.default_prompt);
                });
            });
        });
    }
}

/// One image pane: a label plus the texture, a spinner, or a placeholder.
fn image_pane(
    ui: &mut egui::Ui,
    label: &str,
    texture: Option<&egui::TextureHandle>,
    busy: bool,
    placeholder: &str,
    height: f32,
) {
    ui.group(|ui| {
        ui.set_min_height(height);
        ui.vertical(|ui| {
            ui.label(egui::RichText::new(label).strong());
            ui.add_space(4.0);

            if let Some(tex) = texture {
                let size = tex.size_vec2();
                let avail = ui.available_size();
                let scale = (avail.x / size.x).min(avail.y / size.y).min(1.0);
                ui.image(egui::load::SizedTexture::new(tex.id(), size * scale));
            } else if busy {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        egui::RichText::new(placeholder)
                            .size(16.0)
                            .color(egui::Color32::GRAY),
                    );
                });
            }
        });
    });
}

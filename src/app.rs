// Copyright (C) 2025 Joshua Kesler
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::address::{PLACEHOLDERS, normalize_all};
use crate::capture::BackendOpener;
use crate::config::ViewerConfig;
use crate::display::{SurfaceState, fit_within};
use crate::messages::SLOT_COUNT;
use crate::session::SessionController;
use eframe::{egui, App, Frame};
use std::{sync::Arc, time::{Duration, Instant}};

const CELL_GAP: f32 = 6.0;
const STATUS_HEIGHT: f32 = 28.0;
const CELL_BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0x20, 0x20, 0x20);
const CAPTION_COLOR: egui::Color32 = egui::Color32::from_rgb(0xAA, 0xAA, 0xAA);
const VIDEO_EXTENSIONS: [&str; 7] = ["mjpg", "mjpeg", "mp4", "avi", "mkv", "mov", "webm"];

#[derive(PartialEq)]
enum AppState {
    Splash,
    Configuring,
    Running
}

pub struct ViewerApp {
    state: AppState,
    launched_at: Instant,
    splash: Duration,
    logo_uri: Option<String>,
    inputs: [String; SLOT_COUNT],
    addresses: Option<[String; SLOT_COUNT]>,
    session: SessionController,
    textures: [Option<egui::TextureHandle>; SLOT_COUNT]
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext, config: &ViewerConfig) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);
        let ctx = cc.egui_ctx.clone();
        let opener = Arc::new(BackendOpener::new(config.capture_options()));
        let session = SessionController::new(opener, config.session_settings())
            .with_waker(Arc::new(move || ctx.request_repaint()));

        let logo_uri = config.logo.canonicalize().ok().map(|p| format!("file://{}", p.display()));
        let state = if logo_uri.is_some() && config.splash_ms > 0 { AppState::Splash } else { AppState::Configuring };
        Self {
            state,
            launched_at: Instant::now(),
            splash: config.splash_duration(),
            logo_uri,
            inputs: config.prefilled_addresses(),
            addresses: None,
            session,
            textures: Default::default()
        }
    }

    fn sync_textures(&mut self, ctx: &egui::Context) {
        for i in 0..SLOT_COUNT {
            let Some(surface) = self.session.surface_mut(i) else { continue };
            if let Some(frame) = surface.take_pending() {
                let img = egui::ColorImage::from_rgb(frame.size(), &frame.pixels);
                match &mut self.textures[i] {
                    Some(texture) => texture.set(img, egui::TextureOptions::LINEAR),
                    None => self.textures[i] = Some(ctx.load_texture(format!("camera-{}", i + 1), img, egui::TextureOptions::LINEAR))
                }
            } else if !surface.has_image() {
                self.textures[i] = None;
            }
        }
    }
}

impl App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.session.pump();
        self.sync_textures(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.state {
                AppState::Splash => self.show_splash(ui),
                AppState::Configuring => self.show_config(ui),
                AppState::Running => self.show_running(ui)
            }
        });
    }
}

impl ViewerApp {
    fn show_splash(&mut self, ui: &mut egui::Ui) {
        let elapsed = self.launched_at.elapsed();
        if elapsed >= self.splash {
            self.state = AppState::Configuring;
            ui.ctx().request_repaint();
            return;
        }
        if let Some(uri) = &self.logo_uri {
            ui.centered_and_justified(|ui| {
                ui.add(egui::Image::new(uri.clone()).max_size(egui::vec2(480.0, 480.0)));
            });
        }
        ui.ctx().request_repaint_after(self.splash - elapsed);
    }

    fn show_config(&mut self, ui: &mut egui::Ui) {
        ui.heading("Camera addresses");
        ui.label("host:port, http://, rtsp://, file:// or device://<index>. Leave a row empty to skip it.");
        ui.separator();
        egui::Grid::new("address_grid").num_columns(3).spacing([8.0, 6.0]).show(ui, |ui| {
            for i in 0..SLOT_COUNT {
                ui.label(format!("Camera {}", i + 1));
                ui.add(egui::TextEdit::singleline(&mut self.inputs[i]).hint_text(PLACEHOLDERS[i]).desired_width(360.0));
                if ui.button("Browse").clicked() {
                    let file_choice = rfd::FileDialog::new().add_filter("video", &VIDEO_EXTENSIONS).pick_file();
                    if let Some(path) = file_choice {
                        self.inputs[i] = format!("file://{}", path.to_string_lossy());
                    }
                }
                ui.end_row();
            }
        });

        ui.add_space(20.0);
        let submit = ui.input(|i| i.key_pressed(egui::Key::Enter));
        ui.horizontal(|ui| {
            if ui.button("OK").clicked() || submit {
                let addresses = normalize_all(&self.inputs);
                log::info!("camera addresses: {:?}", addresses);
                self.addresses = Some(addresses);
                self.state = AppState::Running;
            }
            if ui.button("Cancel").clicked() {
                if self.addresses.is_some() {
                    self.state = AppState::Running;
                } else {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        });
    }

    fn show_running(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let streaming = self.session.is_streaming();
            if ui.add_enabled(!streaming, egui::Button::new("Start")).clicked() {
                if let Some(addresses) = &self.addresses {
                    self.session.start_session(addresses);
                }
            }
            if ui.add_enabled(streaming, egui::Button::new("Stop")).clicked() {
                self.session.stop_session();
            }
            if ui.button("Edit cameras").clicked() {
                self.session.stop_session();
                self.state = AppState::Configuring;
            }
            if streaming {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{} of {} running", self.session.running_loops(), self.session.active_loops()));
                });
            }
        });
        ui.separator();

        let grid_size = egui::vec2(ui.available_width(), (ui.available_height() - STATUS_HEIGHT).max(0.0));
        let (area, _) = ui.allocate_exact_size(grid_size, egui::Sense::hover());
        let cell = egui::vec2((area.width() - CELL_GAP) / 2.0, (area.height() - CELL_GAP) / 2.0);
        for i in 0..SLOT_COUNT {
            let offset = egui::vec2((i % 2) as f32 * (cell.x + CELL_GAP), (i / 2) as f32 * (cell.y + CELL_GAP));
            self.paint_cell(ui, i, egui::Rect::from_min_size(area.min + offset, cell));
        }

        ui.separator();
        if self.session.surfaces().iter().any(|s| s.state() == SurfaceState::Error) {
            ui.colored_label(egui::Color32::RED, self.session.status());
        } else {
            ui.label(self.session.status());
        }
    }

    fn paint_cell(&self, ui: &egui::Ui, index: usize, rect: egui::Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, CELL_BACKGROUND);
        let surface = &self.session.surfaces()[index];

        match &self.textures[index] {
            Some(texture) => {
                let size = texture.size_vec2();
                let [w, h] = fit_within([size.x, size.y], [rect.width(), rect.height()]);
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                painter.image(texture.id(), egui::Rect::from_center_size(rect.center(), egui::vec2(w, h)), uv, egui::Color32::WHITE);

                let slot = &self.session.slots()[index];
                painter.text(
                    rect.min + egui::vec2(8.0, 6.0),
                    egui::Align2::LEFT_TOP,
                    format!("{}  #{}", slot, surface.frames_shown()),
                    egui::FontId::proportional(13.0),
                    egui::Color32::WHITE
                );
            }
            None => {
                let color = if surface.state() == SurfaceState::Error { egui::Color32::from_rgb(0xE0, 0x60, 0x60) } else { CAPTION_COLOR };
                painter.text(rect.center(), egui::Align2::CENTER_CENTER, surface.caption(), egui::FontId::proportional(18.0), color);
                if let Some(err) = surface.last_error() {
                    painter.text(rect.center() + egui::vec2(0.0, 40.0), egui::Align2::CENTER_TOP, err, egui::FontId::proportional(12.0), CAPTION_COLOR);
                }
            }
        }
    }
}

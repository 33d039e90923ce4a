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

mod address;
mod app;
mod camera;
mod capture;
mod config;
mod display;
mod mailbox;
mod messages;
mod session;

use anyhow::anyhow;
use clap::Parser;
use eframe::{NativeOptions, egui};
use std::path::Path;

const APP_TITLE: &str = "QuadCam - 4-Cam Live";

fn load_icon(path: &Path) -> Option<egui::IconData> {
    if !path.exists() {
        log::info!("no logo at {}, running without splash and icon", path.display());
        return None;
    }
    match image::open(path) {
        Ok(img) => {
            let rgba = img.into_rgba8();
            let (width, height) = rgba.dimensions();
            Some(egui::IconData { rgba: rgba.into_raw(), width, height })
        }
        Err(e) => {
            log::warn!("cannot load logo {}: {}", path.display(), e);
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = config::ViewerConfig::parse();
    config.validate()?;

    let mut viewport = egui::ViewportBuilder::default()
        .with_title(APP_TITLE)
        .with_inner_size([config.window_width, config.window_height])
        .with_min_inner_size([660.0, 420.0]);
    if let Some(icon) = load_icon(&config.logo) {
        viewport = viewport.with_icon(icon);
    }
    let options = NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(APP_TITLE, options, Box::new(move |cc| {
        Ok(Box::new(app::ViewerApp::new(cc, &config)))
    })).map_err(|e| anyhow!("viewer window failed: {}", e))
}

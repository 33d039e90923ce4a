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

use crate::camera::LoopSettings;
use crate::capture::types::CaptureOptions;
use crate::messages::SLOT_COUNT;
use crate::session::SessionSettings;
use anyhow::{Result, bail};
use clap::Parser;
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live view of up to four cameras in a 2x2 grid")]
pub struct ViewerConfig {
    /// Camera address pre-filled into the address dialog. Repeat up to four times.
    #[arg(long = "camera", value_name = "ADDR", env = "QUADCAM_CAMERAS", value_delimiter = ',')]
    pub cameras: Vec<String>,
    /// Image shown on the splash screen and used as the window icon.
    #[arg(long, default_value = "Logo/InouTLogo.png")]
    pub logo: PathBuf,
    #[arg(long, default_value_t = 1200)]
    pub splash_ms: u64,
    /// Pause between pulls when a source reports no frame rate.
    #[arg(long, default_value_t = 15)]
    pub fallback_interval_ms: u64,
    /// How long a stop waits for the camera loops to release their sources.
    #[arg(long, default_value_t = 500)]
    pub stop_timeout_ms: u64,
    /// Give up on a stalled source after this long. Unset blocks forever.
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,
    #[arg(long, default_value_t = 1280.0)]
    pub window_width: f32,
    #[arg(long, default_value_t = 720.0)]
    pub window_height: f32
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cameras.len() > SLOT_COUNT {
            bail!("at most {} cameras can be given, got {}", SLOT_COUNT, self.cameras.len());
        }
        if self.read_timeout_ms == Some(0) {
            bail!("--read-timeout-ms must be positive");
        }
        Ok(())
    }

    pub fn prefilled_addresses(&self) -> [String; SLOT_COUNT] {
        std::array::from_fn(|i| self.cameras.get(i).map(|c| c.trim().to_string()).unwrap_or_default())
    }

    pub fn splash_duration(&self) -> Duration {
        Duration::from_millis(self.splash_ms)
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions { read_timeout: self.read_timeout_ms.map(Duration::from_millis) }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            loop_settings: LoopSettings { fallback_interval: Duration::from_millis(self.fallback_interval_ms) },
            stop_timeout: Duration::from_millis(self.stop_timeout_ms)
        }
    }
}

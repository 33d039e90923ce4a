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

use std::{collections::HashMap, sync::{Arc, Mutex, atomic::{AtomicUsize, Ordering}}, thread, time::Duration};

use anyhow::anyhow;

use super::{CaptureSource, SourceOpener};
use super::types::{CaptureError, PixelLayout, RawFrame};

#[derive(Debug, Clone)]
pub enum Script {
    FailOpen,
    FramesThenFail(usize),
    Endless { fps: f64 },
    /// Blocks inside the first read, ignoring stop requests.
    Stall(Duration)
}

/// Opener driven by per-address scripts. Each frame's pixels are filled with
/// the first byte of the address so tests can tell sources apart.
pub struct ScriptedOpener {
    default: Script,
    scripts: HashMap<String, Script>,
    opened: Mutex<Vec<String>>,
    released: Arc<AtomicUsize>
}

impl ScriptedOpener {
    pub fn new(default: Script) -> Self {
        Self { default, scripts: HashMap::new(), opened: Mutex::new(Vec::new()), released: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn with(mut self, address: &str, script: Script) -> Self {
        self.scripts.insert(address.to_string(), script);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SourceOpener for ScriptedOpener {
    fn open(&self, address: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        self.opened.lock().unwrap().push(address.to_string());
        let script = self.scripts.get(address).cloned().unwrap_or_else(|| self.default.clone());
        if let Script::FailOpen = script {
            return Err(anyhow!("connection refused").into());
        }
        Ok(Box::new(ScriptedSource {
            script,
            produced: 0,
            marker: address.bytes().next().unwrap_or(0),
            released: self.released.clone()
        }))
    }
}

pub struct ScriptedSource {
    script: Script,
    produced: usize,
    marker: u8,
    released: Arc<AtomicUsize>
}

impl CaptureSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        match self.script {
            Script::FramesThenFail(n) if self.produced >= n => return Err(CaptureError::EndOfStream),
            Script::Stall(d) => {
                thread::sleep(d);
                return Err(CaptureError::Timeout);
            }
            _ => {}
        }
        self.produced += 1;
        Ok(RawFrame::packed(vec![self.marker; 2 * 2 * 3], 2, 2, PixelLayout::Bgr8))
    }

    fn nominal_frame_rate(&self) -> f64 {
        match self.script {
            Script::Endless { fps } => fps,
            _ => 0.0
        }
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

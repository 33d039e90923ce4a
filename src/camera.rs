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

use crate::capture::{SourceOpener, types::{CaptureError, PixelLayout, RawFrame}};
use crate::messages::{Frame, SlotEvent, StreamError, StreamErrorKind};
use anyhow::anyhow;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::{io, sync::Arc, thread::{self, JoinHandle}, time::Duration};

/// Receives everything an acquisition loop produces.
pub trait FrameSink: Send + 'static {
    fn publish(&self, event: SlotEvent);
}

impl FrameSink for Sender<SlotEvent> {
    fn publish(&self, event: SlotEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub fallback_interval: Duration
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self { fallback_interval: Duration::from_millis(15) }
    }
}

pub struct AcquisitionHandle {
    slot: usize,
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>
}

impl AcquisitionHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Asks the loop to leave its pull cycle. Never blocks.
    pub fn request_stop(&mut self) {
        self.stop_tx.take();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Waits up to `wait` for the loop to release its source. Returns false
    /// if it is still running; the thread is then left detached.
    pub fn join_within(mut self, wait: Duration) -> bool {
        self.request_stop();
        match self.done_rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        log::error!("camera {} loop panicked", self.slot + 1);
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("camera {} loop did not stop within {:?}", self.slot + 1, wait);
                false
            }
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.request_stop();
    }
}

pub fn start_acquisition_thread<S: FrameSink>(slot: usize, address: String, opener: Arc<dyn SourceOpener>, sink: S, settings: LoopSettings) -> io::Result<AcquisitionHandle> {
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let (done_tx, done_rx) = bounded::<()>(1);
    let thread = thread::Builder::new()
        .name(format!("camera-{}", slot + 1))
        .spawn(move || {
            run_acquisition(slot, &address, opener.as_ref(), &sink, &stop_rx, settings);
            let _ = done_tx.send(());
        })?;

    Ok(AcquisitionHandle { slot, stop_tx: Some(stop_tx), done_rx, thread: Some(thread) })
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

fn run_acquisition(slot: usize, address: &str, opener: &dyn SourceOpener, sink: &dyn FrameSink, stop_rx: &Receiver<()>, settings: LoopSettings) {
    let mut source = match opener.open(address) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("camera {} open failed: {}", slot + 1, e);
            sink.publish(SlotEvent::Error(StreamError::new(slot, StreamErrorKind::SourceOpenFailed, format!("[X] Cannot open video: {} ({})", address, e))));
            return;
        }
    };
    log::info!("camera {} opened {}", slot + 1, address);

    let mut sequence = 0u64;
    while !stop_requested(stop_rx) {
        let frame = source.read_frame().and_then(|raw| to_rgb_frame(slot, sequence, raw));
        match frame {
            Ok(frame) => sink.publish(SlotEvent::Frame(frame)),
            Err(e) => {
                log::debug!("camera {} read failed after {} frames: {}", slot + 1, sequence, e);
                sink.publish(SlotEvent::Error(StreamError::new(slot, StreamErrorKind::SourceReadFailed, format!("[X] Cannot read frame from: {} ({})", address, e))));
                break;
            }
        }
        sequence += 1;

        let pause = pacing_interval(source.nominal_frame_rate(), settings.fallback_interval);
        match stop_rx.recv_timeout(pause) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break
        }
    }

    source.release();
    log::info!("camera {} released {} after {} frames", slot + 1, address, sequence);
}

pub fn pacing_interval(fps: f64, fallback: Duration) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_millis((1000.0 / fps) as u64)
    } else {
        fallback
    }
}

/// Repacks any supported layout into tightly packed RGB8.
pub fn to_rgb_frame(slot: usize, sequence: u64, raw: RawFrame) -> Result<Frame, CaptureError> {
    let width = raw.width as usize;
    let height = raw.height as usize;
    let bpp = raw.layout.bytes_per_pixel();
    let row_bytes = width * bpp;
    if width == 0 || height == 0 {
        return Err(anyhow!("empty {} frame", raw.layout).into());
    }
    if raw.stride < row_bytes {
        return Err(anyhow!("stride {} shorter than a {} row of {} pixels", raw.stride, raw.layout, width).into());
    }
    let needed = raw.stride * (height - 1) + row_bytes;
    if raw.data.len() < needed {
        return Err(anyhow!("{}x{} {} frame needs {} bytes, got {}", width, height, raw.layout, needed, raw.data.len()).into());
    }

    let out_stride = width * 3;
    let pixels = if raw.layout == PixelLayout::Rgb8 && raw.stride == out_stride && raw.data.len() == needed {
        raw.data
    } else {
        let mut out = Vec::with_capacity(out_stride * height);
        for row in raw.data.chunks(raw.stride).take(height) {
            for px in row[..row_bytes].chunks_exact(bpp) {
                match raw.layout {
                    PixelLayout::Rgb8 | PixelLayout::Rgba8 => out.extend_from_slice(&px[..3]),
                    PixelLayout::Bgr8 | PixelLayout::Bgra8 => out.extend_from_slice(&[px[2], px[1], px[0]]),
                    PixelLayout::Gray8 => out.extend_from_slice(&[px[0], px[0], px[0]])
                }
            }
        }
        out
    };

    Ok(Frame { slot, sequence, pixels, width: raw.width, height: raw.height, stride: out_stride })
}

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

use std::{path::Path, process::{Child, ChildStdout, Command, Stdio}};

use anyhow::{Context, anyhow};

use super::CaptureSource;
use super::mjpeg::{MjpegReader, decode_jpeg};
use super::types::{CaptureError, CaptureOptions, RawFrame};

const FFMPEG: &str = "ffmpeg";

pub fn build_cmd(input: &str, options: &CaptureOptions) -> Vec<String> {
    let live = input.contains("://");
    let mut args = vec![String::from("-hide_banner"), String::from("-loglevel"), String::from("error")];

    if input.to_ascii_lowercase().starts_with("rtsp://") {
        args.push(String::from("-rtsp_transport"));
        args.push(String::from("tcp"));
        if let Some(timeout) = options.read_timeout {
            args.push(String::from("-timeout"));
            args.push(timeout.as_micros().to_string());
        }
    }
    if !live {
        // files play at their own rate instead of as fast as ffmpeg decodes
        args.push(String::from("-re"));
    }

    args.extend([
        String::from("-i"), input.to_string(),
        String::from("-an"),
        String::from("-f"), String::from("image2pipe"),
        String::from("-c:v"), String::from("mjpeg"),
        String::from("-q:v"), String::from("3"),
        String::from("-")
    ]);
    args
}

/// RTSP streams and container files decoded by an `ffmpeg` child process,
/// which re-emits every frame as a JPEG on stdout. The pipe blocks until the
/// next frame exists, so the stream paces itself.
pub struct FfmpegSource {
    child: Option<Child>,
    frames: MjpegReader<ChildStdout>,
    first: Option<RawFrame>,
    input: String
}

impl FfmpegSource {
    pub fn open(input: &str, options: &CaptureOptions) -> Result<Self, CaptureError> {
        if !input.contains("://") && !Path::new(input).is_file() {
            return Err(anyhow!("no such file: {}", input).into());
        }

        let args = build_cmd(input, options);
        log::debug!("{} {}", FFMPEG, args.join(" "));
        let mut child = Command::new(FFMPEG)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn {} for {}", FFMPEG, input))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("{} stdout was not piped", FFMPEG))?;

        let mut source = Self { child: Some(child), frames: MjpegReader::new(stdout), first: None, input: input.to_string() };
        // an input ffmpeg cannot open ends the pipe before the first image
        match source.next_frame() {
            Ok(frame) => source.first = Some(frame),
            Err(CaptureError::EndOfStream) => {
                source.release();
                return Err(anyhow!("{} could not open {}", FFMPEG, input).into());
            }
            Err(e) => {
                source.release();
                return Err(e);
            }
        }
        log::info!("opened {} via {}", input, FFMPEG);
        Ok(source)
    }

    fn next_frame(&mut self) -> Result<RawFrame, CaptureError> {
        let jpeg = self.frames.next_jpeg()?;
        decode_jpeg(&jpeg)
    }
}

impl CaptureSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if self.child.is_none() {
            return Err(CaptureError::EndOfStream);
        }
        match self.first.take() {
            Some(frame) => Ok(frame),
            None => self.next_frame()
        }
    }

    fn nominal_frame_rate(&self) -> f64 {
        0.0
    }

    fn release(&mut self) {
        let Some(mut child) = self.child.take() else { return };
        self.first = None;
        if let Err(e) = child.kill() {
            log::debug!("{} for {} already exited: {}", FFMPEG, self.input, e);
        }
        if let Err(e) = child.wait() {
            log::warn!("{} wait error for {}: {}", FFMPEG, self.input, e);
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

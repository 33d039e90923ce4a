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

use std::{fs::File, io::{BufReader, ErrorKind, Read}, path::Path};

use anyhow::{anyhow, Context};

use super::CaptureSource;
use super::types::{CaptureError, CaptureOptions, PixelLayout, RawFrame};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const CHUNK_BYTES: usize = 8192;

/// Splits a byte stream of concatenated (or multipart-wrapped) JPEGs into
/// individual images.
pub struct MjpegReader<R> {
    reader: R,
    buffer: Vec<u8>
}

impl<R: Read> MjpegReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buffer: Vec::with_capacity(64 * 1024) }
    }

    pub fn next_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        let mut chunk = [0u8; CHUNK_BYTES];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let jpeg = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(jpeg);
            }

            let read = match self.reader.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => return Err(CaptureError::Timeout),
                Err(e) => return Err(anyhow::Error::new(e).context("read mjpeg chunk").into())
            };
            if read == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                // keep the tail, it may hold the first byte of a marker
                let drain_len = self.buffer.len() - 1;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Locates the first complete JPEG. Header segments are stepped over by
/// their length fields, so an EOI inside an EXIF thumbnail does not end the
/// frame early.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = find_image_end(buffer, start + 2)?;
    Some((start, end))
}

fn find_image_end(buffer: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        if *buffer.get(pos)? != 0xFF {
            return find_first_eoi(buffer, pos);
        }
        let mut at = pos + 1;
        while *buffer.get(at)? == 0xFF {
            at += 1;
        }
        let marker = buffer[at];
        let after = at + 1;
        match marker {
            0xD9 => return Some(after),
            0x01 | 0xD0..=0xD8 => pos = after,
            _ => {
                let len = u16::from_be_bytes([*buffer.get(after)?, *buffer.get(after + 1)?]) as usize;
                if len < 2 {
                    return find_first_eoi(buffer, after);
                }
                pos = after + len;
                if marker == 0xDA {
                    pos = skip_entropy_data(buffer, pos)?;
                }
            }
        }
    }
}

/// Position of the next real marker after scan data. Stuffed `FF 00`,
/// fill bytes and restart markers belong to the scan.
fn skip_entropy_data(buffer: &[u8], mut pos: usize) -> Option<usize> {
    while pos + 1 < buffer.len() {
        if buffer[pos] == 0xFF {
            match buffer[pos + 1] {
                0xFF => pos += 1,
                0x00 | 0xD0..=0xD7 => pos += 2,
                _ => return Some(pos)
            }
        } else {
            pos += 1;
        }
    }
    None
}

fn find_first_eoi(buffer: &[u8], from: usize) -> Option<usize> {
    let offset = buffer.get(from..)?.windows(2).position(|w| w == [0xFF, 0xD9])?;
    Some(from + offset + 2)
}

pub(super) fn decode_jpeg(bytes: &[u8]) -> Result<RawFrame, CaptureError> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(RawFrame::packed(rgb.into_raw(), width, height, PixelLayout::Rgb8))
}

/// MJPEG from a multipart HTTP response or from a file on disk. The stream
/// carries no frame rate, so pacing falls back to the loop default.
pub struct MjpegSource {
    origin: String,
    frames: Option<MjpegReader<Box<dyn Read + Send>>>
}

impl MjpegSource {
    pub fn open_file(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(Self {
            origin: path.display().to_string(),
            frames: Some(MjpegReader::new(Box::new(BufReader::new(file))))
        })
    }

    fn from_reader(origin: &str, reader: Box<dyn Read + Send>) -> Self {
        Self { origin: origin.to_string(), frames: Some(MjpegReader::new(reader)) }
    }
}

impl CaptureSource for MjpegSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        let frames = self.frames.as_mut().ok_or(CaptureError::EndOfStream)?;
        let jpeg = frames.next_jpeg()?;
        decode_jpeg(&jpeg)
    }

    fn nominal_frame_rate(&self) -> f64 {
        0.0
    }

    fn release(&mut self) {
        if self.frames.take().is_some() {
            log::debug!("released mjpeg stream {}", self.origin);
        }
    }
}

/// HTTP endpoint that answers every request with one JPEG.
pub struct SnapshotSource {
    url: String,
    agent: ureq::Agent,
    pending: Option<Vec<u8>>,
    released: bool
}

impl SnapshotSource {
    fn fetch(&self) -> Result<Vec<u8>, CaptureError> {
        let response = self.agent.get(&self.url).call().with_context(|| format!("fetch snapshot from {}", self.url))?;
        read_body(response)
    }
}

impl CaptureSource for SnapshotSource {
    fn read_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if self.released {
            return Err(CaptureError::EndOfStream);
        }
        let bytes = match self.pending.take() {
            Some(b) => b,
            None => self.fetch()?
        };
        decode_jpeg(&bytes)
    }

    fn nominal_frame_rate(&self) -> f64 {
        0.0
    }

    fn release(&mut self) {
        self.released = true;
        self.pending = None;
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    response.into_reader().take(MAX_JPEG_BYTES as u64).read_to_end(&mut bytes).context("read snapshot body")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty snapshot").into());
    }
    Ok(bytes)
}

pub fn open_http(url: &str, options: &CaptureOptions) -> Result<Box<dyn CaptureSource>, CaptureError> {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = options.read_timeout {
        builder = builder.timeout_connect(timeout).timeout_read(timeout);
    }
    let agent = builder.build();
    let response = agent.get(url).call().with_context(|| format!("connect to {}", url))?;
    let content_type = response.header("Content-Type").unwrap_or("").to_ascii_lowercase();
    if content_type.contains("multipart") {
        log::debug!("{} serves multipart mjpeg", url);
        let reader: Box<dyn Read + Send> = Box::new(response.into_reader());
        return Ok(Box::new(MjpegSource::from_reader(url, reader)));
    }

    log::debug!("{} serves single images ({})", url, content_type);
    let first = read_body(response)?;
    Ok(Box::new(SnapshotSource { url: url.to_string(), agent, pending: Some(first), released: false }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade, shade]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg).unwrap();
        out
    }

    #[test]
    fn bounds_skip_leading_garbage() {
        let buf = [0x00, 0x11, 0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9, 0x33];
        assert_eq!(find_jpeg_bounds(&buf), Some((2, 8)));
    }

    #[test]
    fn incomplete_image_has_no_bounds() {
        assert_eq!(find_jpeg_bounds(&[0xFF, 0xD8, 0x01, 0xFF]), None);
        assert_eq!(find_jpeg_bounds(&[0x01, 0x02]), None);
    }

    fn with_exif_thumbnail(main: &[u8], thumbnail: &[u8]) -> Vec<u8> {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(thumbnail);
        let mut out = main[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&main[2..]);
        out
    }

    #[test]
    fn embedded_thumbnail_does_not_end_the_frame() {
        let full = with_exif_thumbnail(&jpeg(16, 8, 70), &jpeg(2, 2, 250));
        assert_eq!(find_jpeg_bounds(&full), Some((0, full.len())));

        let mut stream = full.clone();
        stream.extend_from_slice(b"\r\n--frame\r\n\r\n");
        stream.extend_from_slice(&full);
        let mut reader = MjpegReader::new(Cursor::new(stream));
        for _ in 0..2 {
            let frame = decode_jpeg(&reader.next_jpeg().unwrap()).unwrap();
            assert_eq!((frame.width, frame.height), (16, 8));
        }
        assert!(matches!(reader.next_jpeg(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn truncated_header_segment_waits_for_more_data() {
        let full = with_exif_thumbnail(&jpeg(16, 8, 70), &jpeg(2, 2, 250));
        assert_eq!(find_jpeg_bounds(&full[..full.len() / 2]), None);
        assert_eq!(find_jpeg_bounds(&full[..30]), None);
    }

    #[test]
    fn reader_splits_multipart_body() {
        let mut body = Vec::new();
        for (shade, size) in [(40u8, (4u32, 2u32)), (200, (6, 3))] {
            body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            body.extend_from_slice(&jpeg(size.0, size.1, shade));
            body.extend_from_slice(b"\r\n");
        }

        let mut reader = MjpegReader::new(Cursor::new(body));
        let first = decode_jpeg(&reader.next_jpeg().unwrap()).unwrap();
        assert_eq!((first.width, first.height), (4, 2));
        assert_eq!(first.data.len(), 4 * 2 * 3);
        let second = decode_jpeg(&reader.next_jpeg().unwrap()).unwrap();
        assert_eq!((second.width, second.height), (6, 3));
        assert!(matches!(reader.next_jpeg(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn file_source_reads_until_end_of_file() {
        let mut file = tempfile::Builder::new().suffix(".mjpg").tempfile().unwrap();
        file.write_all(&jpeg(8, 4, 90)).unwrap();
        file.write_all(&jpeg(8, 4, 120)).unwrap();
        file.flush().unwrap();

        let mut source = MjpegSource::open_file(file.path()).unwrap();
        assert_eq!(source.nominal_frame_rate(), 0.0);
        assert_eq!(source.read_frame().unwrap().layout, PixelLayout::Rgb8);
        assert!(source.read_frame().is_ok());
        assert!(matches!(source.read_frame(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn released_source_yields_nothing() {
        let mut source = MjpegSource::from_reader("mem", Box::new(Cursor::new(jpeg(2, 2, 0))));
        source.release();
        assert!(matches!(source.read_frame(), Err(CaptureError::EndOfStream)));
    }
}

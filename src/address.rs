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

use crate::messages::SLOT_COUNT;

pub const PLACEHOLDERS: [&str; SLOT_COUNT] = [
    "10.0.0.121:8080",
    "10.0.0.122:8080",
    "10.0.0.123:8080",
    "10.0.0.124:8080"
];

const SCHEMES: [&str; 5] = ["http://", "https://", "rtsp://", "file://", "device://"];

/// Turns what the user typed into a source address. Bare `host:port`
/// entries follow the IP-webcam convention of serving MJPEG at `/video`.
pub fn normalize_address(input: &str) -> String {
    let text = input.trim();
    if text.is_empty() {
        return String::new();
    }
    let lower = text.to_ascii_lowercase();
    if SCHEMES.iter().any(|s| lower.starts_with(s)) {
        text.to_string()
    } else {
        format!("http://{}/video", text)
    }
}

pub fn normalize_all(inputs: &[String; SLOT_COUNT]) -> [String; SLOT_COUNT] {
    std::array::from_fn(|i| normalize_address(&inputs[i]))
}

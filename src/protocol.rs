// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! loadimg wire format
//!
//! ```text
//! loadimg '\n'
//! <address text> '\n'
//! <u32 little-endian image size>
//! <image bytes, in chunks>
//! ```
//!
//! There is no checksum and no acknowledgement. The receiver knows how many
//! payload bytes to read only from the size field.

use crate::error::LoadError;

/// Command token that tells the device a kernel image follows
pub const COMMAND_TOKEN: &str = "loadimg";

/// Terminates the command line and the address line
pub const LINE_TERMINATOR: u8 = b'\n';

/// Load address sent when the caller gives none
pub const DEFAULT_LOAD_ADDRESS: &str = "80000";

pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Payload bytes handed to the transport per write
pub const CHUNK_SIZE: usize = 16;

pub fn command_line() -> Vec<u8> {
    text_line(COMMAND_TOKEN)
}

/// The address is forwarded verbatim; the device decides how to interpret it.
pub fn address_line(address: &str) -> Vec<u8> {
    text_line(address)
}

fn text_line(text: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(text.len() + 1);
    line.extend_from_slice(text.as_bytes());
    line.push(LINE_TERMINATOR);
    line
}

/// Image length as the raw 4-byte size field. Lengths that need more than
/// 32 bits are rejected rather than truncated.
pub fn size_field(len: usize) -> Result<[u8; 4], LoadError> {
    let len = u32::try_from(len).map_err(|_| LoadError::ImageTooLarge(len as u64))?;
    Ok(len.to_le_bytes())
}

pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

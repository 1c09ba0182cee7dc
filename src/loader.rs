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

use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use crate::config::LoadSettings;
use crate::error::LoadError;
use crate::progress::Progress;
use crate::protocol;
use crate::serial::{LineSettings, SerialPort};

// ============================================================================
// Load Request
// ============================================================================

/// One image bound for one load address. Consumed by a single transfer.
#[derive(Debug)]
pub struct LoadRequest {
    target_address: String,
    image: Vec<u8>,
    chunk_size: usize,
}

impl LoadRequest {
    pub fn new(target_address: String, image: Vec<u8>, chunk_size: usize) -> Result<Self, LoadError> {
        if chunk_size == 0 {
            return Err(LoadError::InvalidArgument {
                name: "chunk size",
                reason: "must be a positive integer".to_string(),
            });
        }
        protocol::size_field(image.len())?;

        Ok(LoadRequest { target_address, image, chunk_size })
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn chunk_count(&self) -> usize {
        protocol::chunk_count(self.image.len(), self.chunk_size)
    }

    /// Zero-based chunk `index`. The last chunk is short, never padded.
    fn chunk(&self, index: usize) -> &[u8] {
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.image.len());
        &self.image[start..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub image_len: usize,
    pub chunks: usize,
}

// ============================================================================
// States
// ============================================================================

pub struct SendCommand;
pub struct SendAddress;
pub struct SendSize;
pub struct Streaming;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct LoaderFsm<State> {
    state: PhantomData<State>,
    serial: Box<dyn SerialPort>,
    request: LoadRequest,
    next_chunk: usize,
    chunk_delay: Duration,
}

pub enum Step {
    Next(Box<dyn LoaderState>),
    Done(TransferSummary),
}

pub trait LoaderState: Send {
    fn step(self: Box<Self>, progress: &mut dyn Progress) -> Result<Step, LoadError>;
}

impl<S> LoaderFsm<S> {
    fn transition<T>(self) -> Box<LoaderFsm<T>> {
        Box::new(LoaderFsm {
            state: PhantomData,
            serial: self.serial,
            request: self.request,
            next_chunk: self.next_chunk,
            chunk_delay: self.chunk_delay,
        })
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), LoadError> {
        self.serial.write_all(buf).map_err(|source| {
            let type_name = std::any::type_name::<S>();
            let state = type_name.split("::").last().unwrap_or(type_name);
            LoadError::TransportWrite { state, source }
        })
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl LoaderState for LoaderFsm<SendCommand> {
    fn step(self: Box<Self>, _progress: &mut dyn Progress) -> Result<Step, LoadError> {
        let mut fsm = *self;
        fsm.write(&protocol::command_line())?;
        log::debug!("Sent: {:?}", protocol::COMMAND_TOKEN);
        Ok(Step::Next(fsm.transition::<SendAddress>()))
    }
}

impl LoaderState for LoaderFsm<SendAddress> {
    fn step(self: Box<Self>, _progress: &mut dyn Progress) -> Result<Step, LoadError> {
        let mut fsm = *self;
        let line = protocol::address_line(&fsm.request.target_address);
        fsm.write(&line)?;
        log::debug!("Sent: address {:?}", fsm.request.target_address);
        Ok(Step::Next(fsm.transition::<SendSize>()))
    }
}

impl LoaderState for LoaderFsm<SendSize> {
    fn step(self: Box<Self>, progress: &mut dyn Progress) -> Result<Step, LoadError> {
        let mut fsm = *self;
        let size = protocol::size_field(fsm.request.len())?;
        fsm.write(&size)?;
        log::debug!("Sent: size {} ({:02X?})", fsm.request.len(), size);

        let total = fsm.request.chunk_count();
        log::debug!("Streaming {} chunks of {} bytes", total, fsm.request.chunk_size);
        progress.begin(total);
        Ok(Step::Next(fsm.transition::<Streaming>()))
    }
}

impl LoaderState for LoaderFsm<Streaming> {
    fn step(self: Box<Self>, progress: &mut dyn Progress) -> Result<Step, LoadError> {
        let mut fsm = *self;
        let total = fsm.request.chunk_count();

        if fsm.next_chunk >= total {
            progress.finish();
            return Ok(Step::Done(TransferSummary {
                image_len: fsm.request.len(),
                chunks: total,
            }));
        }

        let index = fsm.next_chunk;
        let chunk = fsm.request.chunk(index).to_vec();
        fsm.write(&chunk)?;
        log::trace!("Sent: chunk {} ({} bytes)", index + 1, chunk.len());

        fsm.next_chunk += 1;
        progress.advance(fsm.next_chunk, total);

        if !fsm.chunk_delay.is_zero() {
            std::thread::sleep(fsm.chunk_delay);
        }

        Ok(Step::Next(Box::new(fsm)))
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl LoaderFsm<SendCommand> {
    pub fn new(serial: Box<dyn SerialPort>, request: LoadRequest, chunk_delay: Duration) -> Box<dyn LoaderState> {
        Box::new(LoaderFsm {
            state: PhantomData::<SendCommand>,
            serial,
            request,
            next_chunk: 0,
            chunk_delay,
        })
    }
}

pub fn run(mut state: Box<dyn LoaderState>, progress: &mut dyn Progress) -> Result<TransferSummary, LoadError> {
    loop {
        match state.step(progress)? {
            Step::Next(next) => state = next,
            Step::Done(summary) => return Ok(summary),
        }
    }
}

/// Opens the transport, reads the image, and pushes one frame. Nothing is
/// written unless the image was read in full.
pub fn transfer<F>(settings: &LoadSettings, open: F, progress: &mut dyn Progress) -> Result<TransferSummary, LoadError>
where
    F: FnOnce(&str, u32, LineSettings) -> Result<Box<dyn SerialPort>, LoadError>,
{
    let serial = open(&settings.device, settings.baud_rate, settings.line)?;

    let image = read_image(&settings.image_path)?;
    let request = LoadRequest::new(settings.load_address.clone(), image, settings.chunk_size)?;
    log::info!("Image size: {} bytes, load address: 0x{}", request.len(), settings.load_address);

    run(LoaderFsm::new(serial, request, settings.chunk_delay), progress)
}

fn read_image(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::ImageNotFound {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use crate::serial::MockSerialPort;
    use std::path::PathBuf;

    fn settings(image_path: PathBuf) -> LoadSettings {
        LoadSettings {
            device: "/dev/mock".to_string(),
            baud_rate: 115200,
            image_path,
            load_address: "80000".to_string(),
            chunk_size: 16,
            chunk_delay: Duration::ZERO,
            line: LineSettings::default(),
        }
    }

    fn write_image(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn header(address: &str, len: u32) -> Vec<Vec<u8>> {
        vec![
            b"loadimg\n".to_vec(),
            format!("{}\n", address).into_bytes(),
            len.to_le_bytes().to_vec(),
        ]
    }

    fn opener(mock: MockSerialPort) -> impl FnOnce(&str, u32, LineSettings) -> Result<Box<dyn SerialPort>, LoadError> {
        move |_, _, _| Ok(Box::new(mock) as Box<dyn SerialPort>)
    }

    #[test]
    fn test_transfer_short_final_chunk() {
        let data = pattern(20);
        let path = write_image("loadimg_short_final.img", &data);

        let mut expected = header("80000", 20);
        expected.push(data[0..16].to_vec());
        expected.push(data[16..20].to_vec());

        let mut progress = RecordingProgress::new();
        let summary = transfer(&settings(path.clone()), opener(MockSerialPort::new(expected)), &mut progress)
            .expect("transfer failed");

        assert_eq!(summary, TransferSummary { image_len: 20, chunks: 2 });
        assert_eq!(progress.total, Some(2));
        assert_eq!(progress.updates, vec![(1, 2), (2, 2)]);
        assert!(progress.finished);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_transfer_empty_image_sends_header() {
        let path = write_image("loadimg_empty.img", b"");

        let mut progress = RecordingProgress::new();
        let summary = transfer(&settings(path.clone()), opener(MockSerialPort::new(header("80000", 0))), &mut progress)
            .expect("transfer failed");

        assert_eq!(summary.chunks, 0);
        assert_eq!(progress.total, Some(0));
        assert!(progress.updates.is_empty());
        assert!(progress.finished);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_transfer_exact_multiple_has_no_empty_chunk() {
        let data = pattern(32);
        let path = write_image("loadimg_exact.img", &data);

        let mut expected = header("80000", 32);
        expected.push(data[0..16].to_vec());
        expected.push(data[16..32].to_vec());

        let mut progress = RecordingProgress::new();
        let summary = transfer(&settings(path.clone()), opener(MockSerialPort::new(expected)), &mut progress)
            .expect("transfer failed");
        assert_eq!(summary.chunks, 2);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_transfer_reconstructs_payload() {
        let data = pattern(1000);
        let path = write_image("loadimg_large.img", &data);

        let mut expected = header("0x200000", 1000);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < data.len() {
            let end = (start + 16).min(data.len());
            chunks.push(data[start..end].to_vec());
            start = end;
        }
        assert_eq!(chunks.len(), 63);
        assert_eq!(chunks.last().unwrap().len(), 8);
        assert_eq!(chunks.concat(), data);
        expected.extend(chunks);

        let mut config = settings(path.clone());
        config.load_address = "0x200000".to_string();

        let mut progress = RecordingProgress::new();
        let summary = transfer(&config, opener(MockSerialPort::new(expected)), &mut progress)
            .expect("transfer failed");

        assert_eq!(summary, TransferSummary { image_len: 1000, chunks: 63 });
        assert_eq!(progress.updates.len(), 63);
        assert_eq!(progress.updates.last(), Some(&(63, 63)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_transfer_custom_chunk_size() {
        let data = pattern(20);
        let path = write_image("loadimg_chunk7.img", &data);

        let mut expected = header("80000", 20);
        expected.push(data[0..7].to_vec());
        expected.push(data[7..14].to_vec());
        expected.push(data[14..20].to_vec());

        let mut config = settings(path.clone());
        config.chunk_size = 7;

        let mut progress = RecordingProgress::new();
        let summary = transfer(&config, opener(MockSerialPort::new(expected)), &mut progress)
            .expect("transfer failed");
        assert_eq!(summary.chunks, 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_image_writes_nothing() {
        let path = std::env::temp_dir().join("loadimg_does_not_exist.img");
        std::fs::remove_file(&path).ok();

        let mut progress = RecordingProgress::new();
        match transfer(&settings(path.clone()), opener(MockSerialPort::new(vec![])), &mut progress) {
            Err(LoadError::ImageNotFound { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected ImageNotFound, got {:?}", other),
        }
        assert_eq!(progress.total, None);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let path = std::env::temp_dir().join("loadimg_never_read.img");

        let open = |device: &str, _: u32, _: LineSettings| -> Result<Box<dyn SerialPort>, LoadError> {
            Err(LoadError::TransportOpen {
                device: device.to_string(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
            })
        };

        let mut progress = RecordingProgress::new();
        match transfer(&settings(path), open, &mut progress) {
            Err(LoadError::TransportOpen { device, .. }) => assert_eq!(device, "/dev/mock"),
            other => panic!("expected TransportOpen, got {:?}", other),
        }
    }

    #[test]
    fn test_write_failure_aborts_stream() {
        let data = pattern(48);
        let path = write_image("loadimg_write_fail.img", &data);

        let mut expected = header("80000", 48);
        expected.push(data[0..16].to_vec());
        let mock = MockSerialPort::new(expected).failing_at(4);

        let mut progress = RecordingProgress::new();
        match transfer(&settings(path.clone()), opener(mock), &mut progress) {
            Err(LoadError::TransportWrite { state, .. }) => assert_eq!(state, "Streaming"),
            other => panic!("expected TransportWrite, got {:?}", other),
        }
        assert_eq!(progress.updates, vec![(1, 3)]);
        assert!(!progress.finished);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_failure_in_header_sends_no_chunks() {
        let data = pattern(20);
        let path = write_image("loadimg_header_fail.img", &data);

        let mock = MockSerialPort::new(vec![b"loadimg\n".to_vec()]).failing_at(1);

        let mut progress = RecordingProgress::new();
        match transfer(&settings(path.clone()), opener(mock), &mut progress) {
            Err(LoadError::TransportWrite { state, .. }) => assert_eq!(state, "SendAddress"),
            other => panic!("expected TransportWrite, got {:?}", other),
        }
        assert_eq!(progress.total, None);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_request_rejects_zero_chunk_size() {
        assert!(matches!(
            LoadRequest::new("80000".to_string(), vec![1, 2, 3], 0),
            Err(LoadError::InvalidArgument { name: "chunk size", .. })
        ));
    }

    #[test]
    fn test_request_chunks_are_not_padded() {
        let request = LoadRequest::new("80000".to_string(), pattern(20), 16).unwrap();
        assert_eq!(request.chunk_count(), 2);
        assert_eq!(request.chunk(0).len(), 16);
        assert_eq!(request.chunk(1), &pattern(20)[16..20]);
    }
}

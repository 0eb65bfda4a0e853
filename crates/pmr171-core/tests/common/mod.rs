//! Scripted in-memory device link shared by the integration tests

#![allow(dead_code)]

use pmr171_core::protocol::{decode, frame_len, DeviceLink, Opcode};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    written: Vec<u8>,
    pending: Vec<u8>,
    input: VecDeque<u8>,
    status_replies: VecDeque<Vec<u8>>,
    fail_writes: bool,
    clears: usize,
    drip: Option<Duration>,
    last_timeout: Option<Duration>,
}

impl MockState {
    /// Queue the next scripted reply once a complete status query has been written
    fn track_frame(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if let Some(len) = frame_len(&self.pending) {
            if self.pending.len() >= len {
                if let Ok(frame) = decode(&self.pending) {
                    if frame.command == Opcode::QueryStatus.byte() {
                        if let Some(reply) = self.status_replies.pop_front() {
                            self.input.extend(reply);
                        }
                    }
                }
                self.pending.drain(..len);
            }
        }
    }
}

/// Mock radio link. Reads with nothing buffered time out immediately.
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    trickle: bool,
}

/// Test-side view of a [`MockLink`]
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    pub fn new() -> (Self, MockHandle) {
        Self::build(false)
    }

    /// Accept one byte per write call, yielding in between
    pub fn trickling() -> (Self, MockHandle) {
        Self::build(true)
    }

    fn build(trickle: bool) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
                trickle,
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    /// Bytes the radio sends in answer to the next status query
    pub fn push_status_reply(&self, reply: Vec<u8>) {
        self.state.lock().unwrap().status_replies.push_back(reply);
    }

    /// Bytes already waiting on the link
    pub fn push_input(&self, bytes: &[u8]) {
        self.state.lock().unwrap().input.extend(bytes.iter().copied());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    /// Deliver input one byte per read, each after `delay`
    pub fn drip(&self, delay: Duration) {
        self.state.lock().unwrap().drip = Some(delay);
    }

    /// Timeout most recently applied to the link
    pub fn last_timeout(&self) -> Option<Duration> {
        self.state.lock().unwrap().last_timeout
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let drip = self.state.lock().unwrap().drip;
        if let Some(delay) = drip {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        if state.input.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let limit = if drip.is_some() { 1 } else { buf.len() };
        let n = limit.min(state.input.len());
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = if self.trickle { buf.len().min(1) } else { buf.len() };
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            state.written.extend_from_slice(&buf[..n]);
            state.track_frame(&buf[..n]);
        }
        if self.trickle {
            std::thread::yield_now();
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceLink for MockLink {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.state.lock().unwrap().last_timeout = Some(timeout);
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.input.clear();
        state.clears += 1;
        Ok(())
    }
}

/// Split a captured byte stream into decoded frames, panicking on any corruption
pub fn split_frames(mut stream: &[u8]) -> Vec<pmr171_core::protocol::Frame> {
    let mut frames = Vec::new();
    while !stream.is_empty() {
        let frame = decode(stream).expect("stream must contain only intact frames");
        stream = &stream[frame.encoded_size()..];
        frames.push(frame);
    }
    frames
}

/// Route library logs through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

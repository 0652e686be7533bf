//! Interactive mode: local input forwarding and how its failures surface.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use termhook::{MockSerialPort, RelayError};

/// Local input that fails on the first read.
struct BrokenInput;

impl Read for BrokenInput {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
    }
}

/// Local input that never yields, like a terminal nobody types into.
struct IdleInput;

impl Read for IdleInput {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}

/// Local input fed from a channel; end of stream once the sender is gone.
struct ChannelInput(Receiver<Vec<u8>>);

impl Read for ChannelInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.recv() {
            Ok(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }
}

/// Device that stays quiet for a while, then prints a prompt.
fn slow_device() -> MockSerialPort {
    let mut port = MockSerialPort::new(MOCK_PORT);
    port.enqueue_pause(Duration::from_millis(150));
    port.enqueue_read(b"$ ");
    port
}

#[test]
fn keystrokes_reach_the_device() {
    let mut harness =
        TestHarness::interactive(slow_device(), raw_mode_ok, scripted_input(b"uname -a\r"));
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    harness.hook.run().unwrap();
    harness.hook.close().unwrap();
    assert_eq!(harness.port.written_bytes(), b"uname -a\r".to_vec());
}

#[test]
fn raw_mode_failure_is_surfaced_after_main_loop() {
    let mut harness = TestHarness::interactive(slow_device(), raw_mode_fails, io::empty());
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    let err = harness.hook.run().unwrap_err();
    match err {
        RelayError::RawMode(ref e) => assert_eq!(e.kind(), io::ErrorKind::Unsupported),
        other => panic!("expected a raw-mode error, got {other:?}"),
    }
    // The main loop ran to completion regardless.
    assert_eq!(harness.port.read_count(), 1);
    harness.hook.close().unwrap();
    assert_eq!(harness.port.close_count(), 1);
}

#[test]
fn input_error_is_returned_when_main_loop_stops_cleanly() {
    let mut harness = TestHarness::interactive(slow_device(), raw_mode_ok, BrokenInput);
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    let err = harness.hook.run().unwrap_err();
    assert!(matches!(err, RelayError::InputRead(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    harness.hook.close().unwrap();
}

#[test]
fn main_loop_error_wins_over_input_error() {
    let mut port = MockSerialPort::new(MOCK_PORT);
    port.enqueue_pause(Duration::from_millis(150));
    port.enqueue_error(io::ErrorKind::BrokenPipe);
    let mut harness = TestHarness::interactive(port, raw_mode_fails, io::empty());

    let err = harness.hook.run().unwrap_err();
    assert!(matches!(err, RelayError::Read(_)), "got {err:?}");
    assert_eq!(harness.trigger.releases(), 1);
    harness.hook.close().unwrap();
}

#[test]
fn device_write_failure_ends_input_forwarding() {
    let mut port = slow_device();
    port.fail_writes(io::ErrorKind::BrokenPipe);
    let mut harness = TestHarness::interactive(port, raw_mode_ok, scripted_input(b"x"));
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    let err = harness.hook.run().unwrap_err();
    assert!(matches!(err, RelayError::DeviceWrite(_)), "got {err:?}");
    harness.hook.close().unwrap();
}

#[test]
fn read_only_mode_never_touches_local_input() {
    let mut harness = TestHarness::new(slow_device());
    harness.hook = harness
        .hook
        .with_local_input(termhook::LocalInput::new(raw_mode_fails, BrokenInput))
        .with_line_handler(stop_immediately);

    harness.hook.run().unwrap();
    harness.hook.close().unwrap();
    assert!(harness.port.written_bytes().is_empty());
}

#[test]
fn run_returns_after_grace_when_input_never_yields() {
    let grace = Duration::from_millis(300);
    let mut harness =
        TestHarness::interactive_with_grace(slow_device(), raw_mode_ok, IdleInput, grace);
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    let started = Instant::now();
    harness.hook.run().unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= grace, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
    harness.hook.close().unwrap();
    assert!(harness.port.written_bytes().is_empty());
}

#[test]
fn input_after_close_never_reaches_device() {
    let (keys, rx) = mpsc::channel();
    let mut harness = TestHarness::interactive_with_grace(
        slow_device(),
        raw_mode_ok,
        ChannelInput(rx),
        Duration::from_millis(50),
    );
    harness.hook = harness.hook.with_line_handler(stop_immediately);

    harness.hook.run().unwrap();
    harness.hook.close().unwrap();

    // The input activity is still detached, parked in its read.
    keys.send(b"late".to_vec()).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(harness.port.written_bytes().is_empty());
}

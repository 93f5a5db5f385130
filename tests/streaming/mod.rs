//! End-to-end streaming: pin, producer thread, allocator and peer together.

use crabeye::testing::{ManualClock, MockDevice, RecordingPeer};
use crabeye::{
    Allocator, CaptureSource, ChannelSink, DeviceHandle, MediaFormat, MediaSample,
    MemoryAllocator, OutputPin, PinError, PinSettings, ReferenceClock, StreamConfig,
    StreamState, Streamer, SystemClock,
};
use crabeye::{AdapterConfig, CapturePin};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn mock_pin(device: Arc<MockDevice>, clock: Option<Arc<dyn ReferenceClock>>) -> Arc<CapturePin> {
    Arc::new(CapturePin::new(
        Some(device as Arc<dyn DeviceHandle>),
        clock,
        PinSettings::default(),
    ))
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_deviceless_pull_yields_zeroed_frame() {
    let clock: Arc<dyn ReferenceClock> = Arc::new(SystemClock::new());
    let pin = CapturePin::new(None, Some(clock), PinSettings::default());
    let mut producer = pin.on_start().unwrap();
    assert_eq!(pin.state().unwrap(), StreamState::Running);

    let mut sample = MediaSample::from_vec(vec![0x5A; 640 * 480 * 4]);
    producer.produce_frame(&mut sample).unwrap();
    assert_eq!(sample.actual_len(), 640 * 480 * 4);
    assert!(sample.data().iter().all(|b| *b == 0));
    assert!(sample.is_sync_point());

    let (start, end) = sample.times().unwrap();
    assert_eq!(end - start, 333_333);
    pin.on_stop().unwrap();
}

#[test]
fn test_deviceless_stream_without_clock_is_untimed() {
    let pin = Arc::new(CapturePin::deviceless());
    let peer = Arc::new(RecordingPeer::accepting_all());
    pin.connect(peer.clone()).unwrap();

    let streamer = Streamer::new(Arc::clone(&pin), Arc::new(MemoryAllocator::new()));
    streamer.activate().unwrap();
    let frames = peer.wait_for_frames(5, WAIT);
    streamer.deactivate().unwrap();

    assert!(frames.len() >= 5);
    for frame in &frames {
        assert_eq!(frame.len, 640 * 480 * 4);
        assert!(frame.all_zero);
        assert!(frame.sync_point);
        assert_eq!(frame.times, None);
    }
}

#[test]
fn test_timestamps_restart_with_each_run() {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let pin = Arc::new(CapturePin::new(
        None,
        Some(clock.clone() as Arc<dyn ReferenceClock>),
        PinSettings::default(),
    ));
    pin.set_format(&MediaFormat::bgra32(320, 240, 60)).unwrap();
    let interval = 166_666;

    let mut first = pin.on_start().unwrap();
    clock.advance(interval * 3);
    let mut sample = MediaSample::new(320 * 240 * 4);
    first.produce_frame(&mut sample).unwrap();
    assert_eq!(sample.times(), Some((interval * 2, interval * 3)));
    pin.on_stop().unwrap();

    clock.advance(50_000_000);
    let mut second = pin.on_start().unwrap();
    second.produce_frame(&mut sample).unwrap();
    assert_eq!(sample.times(), Some((-interval, 0)));
    pin.on_stop().unwrap();
}

#[test]
fn test_device_stream_delivers_every_frame_in_order() {
    let device = Arc::new(MockDevice::new());
    let pin = mock_pin(device.clone(), None);
    pin.set_format(&MediaFormat::bgra32(320, 240, 30)).unwrap();

    let (sink, frames) = ChannelSink::bounded(1);
    pin.connect(Arc::new(sink)).unwrap();

    let streamer = Streamer::new(Arc::clone(&pin), Arc::new(MemoryAllocator::new()));
    streamer.activate().unwrap();

    let mut previous = None;
    for _ in 0..10 {
        let sample = frames.recv_timeout(WAIT).unwrap();
        assert_eq!(sample.actual_len(), 320 * 240 * 4);
        assert_eq!(sample.data()[3], 0xFF);
        // pixel (0, 0) blue channel carries the frame number
        let marker = sample.data()[0];
        if let Some(previous) = previous {
            assert_eq!(marker, u8::wrapping_add(previous, 1), "a frame was skipped");
        }
        previous = Some(marker);
    }

    streamer.deactivate().unwrap();
    let state = device.state();
    assert_eq!(state.init_calls.len(), 1);
    assert_eq!(state.flip, Some((false, true)));
    assert!(!state.streaming);
    assert_eq!(pin.state().unwrap(), StreamState::Stopped);
}

#[test]
fn test_stop_interrupts_blocked_device_read() {
    let device = Arc::new(MockDevice::new().gated());
    let pin = mock_pin(device.clone(), None);
    let peer = Arc::new(RecordingPeer::accepting_all());
    pin.connect(peer.clone()).unwrap();

    let streamer = Streamer::new(Arc::clone(&pin), Arc::new(MemoryAllocator::new()));
    streamer.activate().unwrap();
    device.release_frames(2);
    assert_eq!(peer.wait_for_frames(2, WAIT).len(), 2);

    // producer is now blocked inside read_frame
    let started = Instant::now();
    assert_eq!(streamer.deactivate().unwrap(), 2);
    assert!(started.elapsed() < WAIT);
    assert!(streamer.last_error().is_none());
}

#[test]
fn test_format_change_while_running_waits_for_restart() {
    let device = Arc::new(MockDevice::new().gated());
    let clock: Arc<dyn ReferenceClock> = Arc::new(ManualClock::new(0));
    let pin = mock_pin(device.clone(), Some(clock));
    let peer = Arc::new(RecordingPeer::accepting_all());
    pin.connect(peer.clone()).unwrap();

    let allocator = Arc::new(MemoryAllocator::new());
    let streamer = Streamer::new(Arc::clone(&pin), allocator.clone());
    streamer.activate().unwrap();
    device.release_frames(1);
    assert_eq!(peer.wait_for_frames(1, WAIT).len(), 1);

    // change the format from the control path while a read is in flight
    let control = {
        let pin = Arc::clone(&pin);
        thread::spawn(move || pin.set_format(&MediaFormat::bgra32(320, 240, 15)))
    };
    control.join().unwrap().unwrap();
    assert!(pin.reconnect_pending());
    assert_eq!(pin.get_format().unwrap(), MediaFormat::bgra32(320, 240, 15));

    device.release_frames(3);
    let frames = peer.wait_for_frames(4, WAIT);
    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|f| f.len == 640 * 480 * 4));
    assert!(frames.iter().all(|f| f.times.map(|(s, e)| e - s) == Some(333_333)));

    streamer.deactivate().unwrap();
    assert!(!pin.reconnect_pending());
    assert_eq!(
        pin.connected_format().unwrap(),
        Some(MediaFormat::bgra32(320, 240, 15))
    );

    let granted = streamer.activate().unwrap();
    assert_eq!(granted.buffer_size, 320 * 240 * 4);
    device.release_frames(2);
    let frames = peer.wait_for_frames(6, WAIT);
    assert_eq!(frames.len(), 6);
    assert!(frames[4..].iter().all(|f| f.len == 320 * 240 * 4));
    streamer.deactivate().unwrap();

    let inits = device.state().init_calls;
    assert_eq!(inits.len(), 2);
    assert_eq!((inits[1].0, inits[1].1, inits[1].2), (320, 240, 15));
}

#[test]
fn test_device_init_failure_surfaces_from_activate() {
    let device = Arc::new(MockDevice::new().failing_init());
    let pin = mock_pin(device.clone(), None);
    pin.connect(Arc::new(RecordingPeer::accepting_all())).unwrap();

    let allocator = Arc::new(MemoryAllocator::new());
    let streamer = Streamer::new(Arc::clone(&pin), allocator.clone());
    assert!(matches!(
        streamer.activate(),
        Err(PinError::DeviceInitFailed(_))
    ));
    assert!(!streamer.is_active());
    assert!(!allocator.is_committed());
    assert_eq!(pin.state().unwrap(), StreamState::Stopped);

    // the graph can still be torn down cleanly
    assert_eq!(streamer.deactivate().unwrap(), 0);
    pin.disconnect().unwrap();
}

#[test]
fn test_device_init_failure_can_fall_back_to_blank_frames() {
    let mut config = AdapterConfig::default();
    config.stream.blank_frames_on_device_failure = true;
    let device = Arc::new(MockDevice::new().failing_init());
    let source = CaptureSource::new(vec![device as Arc<dyn DeviceHandle>], &config).unwrap();

    let peer = Arc::new(RecordingPeer::accepting_all());
    source.pin().connect(peer.clone()).unwrap();
    let streamer = source.streamer(Arc::new(MemoryAllocator::new()));
    streamer.activate().unwrap();

    let frames = peer.wait_for_frames(2, WAIT);
    streamer.deactivate().unwrap();
    assert!(frames.len() >= 2);
    assert!(frames.iter().all(|f| f.all_zero));
    assert!(frames.iter().all(|f| f.times.is_some()));
}

#[test]
fn test_undersized_allocator_blocks_activation() {
    let pin = Arc::new(CapturePin::deviceless());
    pin.connect(Arc::new(RecordingPeer::accepting_all())).unwrap();
    let allocator = Arc::new(MemoryAllocator::with_max_buffer_size(1024));
    let streamer = Streamer::new(Arc::clone(&pin), allocator.clone());

    assert!(matches!(
        streamer.activate(),
        Err(PinError::AllocatorUnsuitable { .. })
    ));
    assert!(!allocator.is_committed());
    assert_eq!(pin.state().unwrap(), StreamState::Stopped);
}

#[test]
fn test_disconnected_consumer_ends_stream() {
    let pin = Arc::new(CapturePin::deviceless());
    let (sink, frames) = ChannelSink::bounded(2);
    pin.connect(Arc::new(sink)).unwrap();

    let streamer = Streamer::new(Arc::clone(&pin), Arc::new(MemoryAllocator::new()));
    streamer.activate().unwrap();
    frames.recv_timeout(WAIT).unwrap();
    drop(frames);

    assert!(wait_until(|| streamer.last_error().is_some()));
    assert_eq!(streamer.last_error(), Some(PinError::NotConnected));
    streamer.deactivate().unwrap();
}

#[test]
fn test_dropping_streamer_stops_device() {
    let device = Arc::new(MockDevice::new().with_frame_delay(Duration::from_millis(2)));
    let pin = mock_pin(device.clone(), None);
    let peer = Arc::new(RecordingPeer::accepting_all());
    pin.connect(peer.clone()).unwrap();

    {
        let streamer = Streamer::new(Arc::clone(&pin), Arc::new(MemoryAllocator::new()));
        streamer.activate().unwrap();
        peer.wait_for_frames(1, WAIT);
    }

    assert!(!device.state().streaming);
    assert_eq!(device.state().stop_count, 1);
    assert_eq!(pin.state().unwrap(), StreamState::Stopped);
}

#[test]
fn test_pool_buffers_are_recycled() {
    let pin = Arc::new(CapturePin::deviceless());
    pin.set_format(&MediaFormat::bgra32(320, 240, 60)).unwrap();
    let peer = Arc::new(RecordingPeer::accepting_all());
    pin.connect(peer.clone()).unwrap();

    let allocator = Arc::new(MemoryAllocator::new());
    let streamer = Streamer::new(Arc::clone(&pin), allocator.clone());
    let granted = streamer.activate().unwrap();
    assert_eq!(granted.buffer_count, 2);

    // far more frames than buffers means every buffer came back
    assert!(peer.wait_for_frames(20, WAIT).len() >= 20);
    streamer.deactivate().unwrap();
    assert_eq!(allocator.properties().buffer_count, 2);
}

//! End-to-end pipeline test: mock IMU source through acquisition,
//! alignment, fusion, and delivery, with cooperative shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use imud::{
    Daemon, DaemonConfig, EventSink, OutputEvent, RecordingConfigSink, ScalingPassthrough,
};
use imud_core::ImudResult;
use imud_driver_mock::{MockImuConfig, MockImuSource};

#[derive(Clone, Default)]
struct CollectingSink(Arc<Mutex<Vec<OutputEvent>>>);

impl EventSink for CollectingSink {
    fn deliver(&mut self, event: &OutputEvent) -> ImudResult<()> {
        self.0.lock().push(*event);
        Ok(())
    }
}

fn test_config() -> DaemonConfig {
    DaemonConfig {
        poll_timeout_ms: 1,
        mock: MockImuConfig {
            samples_per_poll: 4,
            with_mag: true,
            mag_decimation: 2,
            realtime: true,
            ..MockImuConfig::default()
        },
        ..DaemonConfig::default()
    }
}

fn run_pipeline(config: &DaemonConfig, runtime: Duration) -> (Vec<OutputEvent>, imud_core::StatsSnapshot) {
    let sink = CollectingSink::default();
    let events = Arc::clone(&sink.0);

    let mut daemon = Daemon::start(
        config,
        vec![Box::new(MockImuSource::new(config.mock.clone()))],
        Box::new(ScalingPassthrough::new(config.accel_range, config.gyro_range)),
        Box::new(sink),
        Box::new(RecordingConfigSink::default()),
    )
    .unwrap();

    for id in [1, 2, 3] {
        daemon.activate(id, true).unwrap();
    }
    std::thread::sleep(runtime);
    daemon.shutdown();
    let stats = daemon.stats();
    let events = events.lock().clone();
    (events, stats)
}

#[test]
fn test_events_flow_end_to_end() {
    let (events, stats) = run_pipeline(&test_config(), Duration::from_millis(100));

    assert!(!events.is_empty());
    assert_eq!(stats.events_delivered, events.len() as u64);
    assert!(stats.frames_aligned > 0);
    assert!(stats.batches_merged > 0);
    assert_eq!(stats.decode_errors, 0);

    // All three streams made it through.
    for sensor_id in [1, 2, 3] {
        assert!(
            events.iter().any(|e| e.sensor_id == sensor_id),
            "no events for sensor {sensor_id}"
        );
    }
}

#[test]
fn test_per_stream_timestamps_monotonic() {
    let (events, _stats) = run_pipeline(&test_config(), Duration::from_millis(100));

    for sensor_id in [1, 2, 3] {
        let stamps: Vec<_> = events
            .iter()
            .filter(|e| e.sensor_id == sensor_id)
            .map(|e| e.timestamp_ns)
            .collect();
        assert!(
            stamps.windows(2).all(|w| w[0] < w[1]),
            "sensor {sensor_id} timestamps regressed"
        );
    }
}

#[test]
fn test_accel_gyro_share_frame_timestamps() {
    // Data-sync bursts give accel and gyro identical timestamps; both
    // must survive alignment as one frame each, not shadow one another.
    let (events, _stats) = run_pipeline(&test_config(), Duration::from_millis(100));

    let accel: Vec<_> = events
        .iter()
        .filter(|e| e.sensor_id == 1)
        .map(|e| e.timestamp_ns)
        .collect();
    let gyro: Vec<_> = events
        .iter()
        .filter(|e| e.sensor_id == 3)
        .map(|e| e.timestamp_ns)
        .collect();
    let common = accel.len().min(gyro.len());
    assert!(common > 0);
    assert_eq!(accel[..common], gyro[..common]);
}

#[test]
fn test_malformed_records_survive_pipeline() {
    let mut config = test_config();
    config.mock.malformed_rate = 0.2;
    let (events, stats) = run_pipeline(&config, Duration::from_millis(100));

    assert!(stats.decode_errors > 0);
    assert!(!events.is_empty());
    assert_eq!(stats.events_delivered, events.len() as u64);
}

#[test]
fn test_flush_marker_delivered_in_order() {
    let config = test_config();
    let sink = CollectingSink::default();
    let events = Arc::clone(&sink.0);

    let mut daemon = Daemon::start(
        &config,
        vec![Box::new(MockImuSource::new(config.mock.clone()))],
        Box::new(ScalingPassthrough::new(config.accel_range, config.gyro_range)),
        Box::new(sink),
        Box::new(RecordingConfigSink::default()),
    )
    .unwrap();

    daemon.activate(1, true).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    daemon.flush(1).unwrap();
    daemon.shutdown();

    let events = events.lock();
    let marker = events
        .iter()
        .position(|e| e.sensor_type == imud::event::SENSOR_TYPE_META_DATA)
        .unwrap();
    assert_eq!(events[marker].sensor_id, 1);
    assert!(marker > 0, "flush marker should follow delivered events");
}

#[test]
fn test_shutdown_drains_pending_data() {
    // Short run with a fast producer: whatever acquisition staged before
    // the stop flag must still be counted as delivered or dropped, never
    // silently lost.
    let mut config = test_config();
    config.mock.realtime = false;
    config.mock.samples_per_poll = 1;
    let (events, stats) = run_pipeline(&config, Duration::from_millis(20));

    assert_eq!(stats.events_delivered, events.len() as u64);
    assert!(stats.events_delivered > 0);
}

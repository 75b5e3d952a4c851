//! Daemon lifecycle: thread spawn, the control-plane surface, and
//! cooperative shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use imud_core::{
    ImudError, ImudResult, PipelineStats, RawSource, Sample, SharedChannel, StatsSnapshot,
};

use crate::acquisition::AcquisitionLoop;
use crate::config::DaemonConfig;
use crate::event::{EventSink, OutputEvent};
use crate::fusion::FusionEngine;
use crate::processing::ProcessingLoop;
use crate::subscription::{ConfigSink, SubscriptionTable};

/// A running pipeline: two worker threads plus the shared control state.
///
/// Lock order, where both are needed: subscription table first, config
/// sink second. The event sink lock is shared with the processing thread
/// and held only per delivered event.
pub struct Daemon {
    stop: Arc<AtomicBool>,
    channel: Arc<SharedChannel<Sample>>,
    stats: Arc<PipelineStats>,
    table: Arc<RwLock<SubscriptionTable>>,
    config_sink: Mutex<Box<dyn ConfigSink>>,
    sink: Arc<Mutex<Box<dyn EventSink>>>,
    acquisition: Option<JoinHandle<()>>,
    processing: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Spawn both worker threads and return the running daemon.
    pub fn start(
        config: &DaemonConfig,
        sources: Vec<Box<dyn RawSource>>,
        engine: Box<dyn FusionEngine>,
        sink: Box<dyn EventSink>,
        config_sink: Box<dyn ConfigSink>,
    ) -> ImudResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let channel = Arc::new(SharedChannel::new(config.channel_capacity));
        let stats = Arc::new(PipelineStats::default());
        let sink: Arc<Mutex<Box<dyn EventSink>>> = Arc::new(Mutex::new(sink));

        let mut acquisition = AcquisitionLoop::new(
            sources,
            config.stage_capacity,
            config.resample_flags(),
            Arc::clone(&channel),
            Arc::clone(&stats),
            Arc::clone(&stop),
            config.poll_timeout(),
        );
        let acquisition_handle = std::thread::Builder::new()
            .name("imud-acquisition".into())
            .spawn(move || acquisition.run())
            .map_err(|source| ImudError::ThreadSpawn {
                thread: "acquisition",
                source,
            })?;

        let mut processing = ProcessingLoop::new(
            Arc::clone(&channel),
            engine,
            Arc::clone(&sink),
            Arc::clone(&stats),
        );
        let processing_handle = match std::thread::Builder::new()
            .name("imud-processing".into())
            .spawn(move || processing.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                // Unwind the first thread before reporting.
                stop.store(true, Ordering::Release);
                if acquisition_handle.join().is_err() {
                    warn!("Acquisition thread panicked during spawn rollback");
                }
                channel.close();
                return Err(ImudError::ThreadSpawn {
                    thread: "processing",
                    source,
                });
            }
        };

        info!("Daemon started");
        Ok(Self {
            stop,
            channel,
            stats,
            table: Arc::new(RwLock::new(SubscriptionTable::default())),
            config_sink: Mutex::new(config_sink),
            sink,
            acquisition: Some(acquisition_handle),
            processing: Some(processing_handle),
        })
    }

    /// Enable or disable a virtual sensor. Hardware configuration is sent
    /// only when the active set actually changed.
    pub fn activate(&self, id: i32, enable: bool) -> ImudResult<()> {
        let changed = self.table.write().activate(id, enable)?;
        if !changed {
            return Ok(());
        }
        info!(id, enable, "Subscription changed");
        let endpoint = endpoint_for(id);
        let mut sink = self.config_sink.lock();
        sink.write_config(&endpoint, "enable", if enable { "1" } else { "0" })?;
        if enable {
            let entry = *self.table.read().entry(id)?;
            sink.write_config(&endpoint, "rate_code", &(entry.rate_code as u8).to_string())?;
        }
        Ok(())
    }

    /// Flag a virtual sensor as on-change; subsequent rate requests for
    /// it map to an event frequency instead of a sampling rate code.
    pub fn mark_on_change(&self, id: i32) -> ImudResult<()> {
        self.table.write().mark_on_change(id)
    }

    /// Update rate and latency for a virtual sensor. For on-change
    /// sensors the period is translated to an event frequency and the
    /// rate code is disabled. Hardware configuration is sent only when
    /// the sensor is currently active; otherwise the encoding is
    /// pre-staged for the next activation.
    pub fn set_batch(&self, id: i32, period_ns: i64, max_latency_ns: i64) -> ImudResult<()> {
        let mut table = self.table.write();
        let (period_ns, on_change_hz) = if table.is_on_change(id)? && period_ns > 0 {
            (0, 1_000_000_000.0 / period_ns as f32)
        } else {
            (period_ns, 0.0)
        };
        let active = table.set_batch(id, period_ns, max_latency_ns, on_change_hz)?;
        let entry = *table.entry(id)?;
        drop(table);
        if !active {
            return Ok(());
        }

        let endpoint = endpoint_for(id);
        // Unit selector in the top two bits, 14-bit value below.
        let packed = (u16::from(entry.latency_unit as u8) << 8) | entry.max_latency;
        let mut sink = self.config_sink.lock();
        sink.write_config(&endpoint, "rate_code", &(entry.rate_code as u8).to_string())?;
        sink.write_config(&endpoint, "latency", &packed.to_string())?;
        sink.write_config(&endpoint, "fifo_len", &entry.fifo_len.to_string())?;
        Ok(())
    }

    /// Acknowledge a flush request by emitting the completion marker in
    /// stream order, behind any events already being delivered.
    pub fn flush(&self, id: i32) -> ImudResult<()> {
        // Validates the id range.
        let _ = self.table.read().entry(id)?;
        if self.stop.load(Ordering::Acquire) {
            return Err(ImudError::ChannelClosed);
        }
        self.sink.lock().deliver(&OutputEvent::flush_complete(id))?;
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn subscriptions(&self) -> Arc<RwLock<SubscriptionTable>> {
        Arc::clone(&self.table)
    }

    /// Stop both threads and wait for them. The producer is joined before
    /// the channel closes so its final staged batch reaches the channel
    /// first; the consumer then drains everything pending before it
    /// observes the close.
    pub fn shutdown(&mut self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Daemon shutting down");
        if let Some(handle) = self.acquisition.take() {
            if handle.join().is_err() {
                warn!("Acquisition thread panicked");
            }
        }
        self.channel.close();
        if let Some(handle) = self.processing.take() {
            if handle.join().is_err() {
                warn!("Processing thread panicked");
            }
        }
        info!("Daemon stopped");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn endpoint_for(id: i32) -> String {
    format!("sensor{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VecSink;
    use crate::fusion::{AccelRange, GyroRange, ScalingPassthrough};
    use imud_core::{RawRecord, CHANNEL_ACCEL};
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    struct IdleSource;

    type Writes = Arc<Mutex<Vec<(String, String, String)>>>;

    struct SharedConfigSink(Writes);

    impl ConfigSink for SharedConfigSink {
        fn write_config(&mut self, endpoint: &str, key: &str, value: &str) -> ImudResult<()> {
            self.0
                .lock()
                .push((endpoint.to_owned(), key.to_owned(), value.to_owned()));
            Ok(())
        }
    }

    impl RawSource for IdleSource {
        fn name(&self) -> &str {
            "idle"
        }

        fn poll(&mut self, timeout: Duration) -> ImudResult<Vec<RawRecord>> {
            std::thread::sleep(timeout);
            Ok(Vec::new())
        }
    }

    fn start_idle() -> (Daemon, Writes) {
        let writes: Writes = Arc::new(Mutex::new(Vec::new()));
        let config = DaemonConfig {
            poll_timeout_ms: 1,
            ..DaemonConfig::default()
        };
        let daemon = Daemon::start(
            &config,
            vec![Box::new(IdleSource)],
            Box::new(ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000)),
            Box::new(VecSink::default()),
            Box::new(SharedConfigSink(Arc::clone(&writes))),
        )
        .unwrap();
        (daemon, writes)
    }

    #[test]
    fn test_start_and_shutdown() {
        let (mut daemon, _writes) = start_idle();
        daemon.shutdown();
        // Idempotent.
        daemon.shutdown();
    }

    #[test]
    fn test_activate_rejects_unknown_id() {
        let (mut daemon, writes) = start_idle();
        assert!(matches!(
            daemon.activate(99, true),
            Err(ImudError::UnknownSensor(99))
        ));
        assert!(writes.lock().is_empty());
        daemon.shutdown();
    }

    #[test]
    fn test_duplicate_activate_sends_config_once() {
        let (mut daemon, writes) = start_idle();
        daemon.activate(3, true).unwrap();
        daemon.activate(3, true).unwrap();
        let enables: Vec<_> = writes
            .lock()
            .iter()
            .filter(|(_, key, _)| key == "enable")
            .cloned()
            .collect();
        assert_eq!(
            enables,
            vec![("sensor3".to_owned(), "enable".to_owned(), "1".to_owned())]
        );
        daemon.shutdown();
    }

    #[test]
    fn test_set_batch_inactive_prestages() {
        let (mut daemon, writes) = start_idle();
        daemon.set_batch(5, 20_000_000, 200_000_000).unwrap();
        assert!(writes.lock().is_empty());
        let table = daemon.subscriptions();
        assert_eq!(
            table.read().entry(5).unwrap().rate_code,
            crate::subscription::RateCode::Hz50
        );
        daemon.shutdown();
    }

    #[test]
    fn test_set_batch_active_writes_rate_and_latency() {
        let (mut daemon, writes) = start_idle();
        daemon.activate(5, true).unwrap();
        daemon.set_batch(5, 2_500_000, 200_000_000).unwrap();
        let keys: Vec<_> = writes
            .lock()
            .iter()
            .filter(|(endpoint, _, _)| endpoint == "sensor5")
            .map(|(_, key, value)| (key.clone(), value.clone()))
            .collect();
        // enable + initial rate, then batch rate + packed latency + fifo.
        assert!(keys.contains(&("rate_code".to_owned(), "1".to_owned())));
        let packed = (0x80u16 << 8) | 200;
        assert!(keys.contains(&("latency".to_owned(), packed.to_string())));
        // 200 ms of 400 Hz samples.
        assert!(keys.contains(&("fifo_len".to_owned(), "80".to_owned())));
        daemon.shutdown();
    }

    #[test]
    fn test_on_change_period_maps_to_event_frequency() {
        let (mut daemon, _writes) = start_idle();
        daemon.mark_on_change(6).unwrap();
        daemon.set_batch(6, 20_000_000, 0).unwrap();

        let table = daemon.subscriptions();
        let entry = *table.read().entry(6).unwrap();
        assert_eq!(entry.rate_code, crate::subscription::RateCode::Disabled);
        assert!((entry.on_change_hz - 50.0).abs() < 1e-6);

        // An unflagged sensor keeps the ordinary rate-code path.
        daemon.set_batch(7, 20_000_000, 0).unwrap();
        let entry = *table.read().entry(7).unwrap();
        assert_eq!(entry.rate_code, crate::subscription::RateCode::Hz50);
        assert_eq!(entry.on_change_hz, 0.0);
        daemon.shutdown();
    }

    struct SlowSource {
        produced: Arc<AtomicU64>,
        seq: i64,
    }

    impl RawSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn poll(&mut self, _timeout: Duration) -> ImudResult<Vec<RawRecord>> {
            std::thread::sleep(Duration::from_millis(60));
            self.seq += 10;
            self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(vec![RawRecord {
                channel: CHANNEL_ACCEL,
                x: 1,
                y: 2,
                z: 3,
                timestamp_ns: self.seq,
            }])
        }
    }

    #[test]
    fn test_shutdown_accounts_for_final_poll() {
        // Shutdown lands while the source is mid-poll; the records from
        // that last poll must still show up as delivered or dropped.
        let produced = Arc::new(AtomicU64::new(0));
        let config = DaemonConfig {
            poll_timeout_ms: 1,
            ..DaemonConfig::default()
        };
        let mut daemon = Daemon::start(
            &config,
            vec![Box::new(SlowSource {
                produced: Arc::clone(&produced),
                seq: 0,
            })],
            Box::new(ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000)),
            Box::new(VecSink::default()),
            Box::new(SharedConfigSink(Arc::new(Mutex::new(Vec::new())))),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        daemon.shutdown();

        let stats = daemon.stats();
        let accounted = stats.events_delivered + stats.total_drops() + stats.decode_errors;
        assert!(produced.load(Ordering::SeqCst) > 0);
        assert_eq!(accounted, produced.load(Ordering::SeqCst));
    }

    #[test]
    fn test_flush_validates_id() {
        let (mut daemon, _writes) = start_idle();
        daemon.flush(0).unwrap();
        assert!(daemon.flush(-5).is_err());
        daemon.shutdown();
        assert!(matches!(daemon.flush(0), Err(ImudError::ChannelClosed)));
    }
}

//! The active-subscription table: which virtual sensors are enabled and at
//! what rates.
//!
//! Two independent banks (non-wake, wake) each hold a fixed array of
//! per-slot configuration entries plus a sorted, gap-free array of active
//! slot references. Control-plane calls mutate the table; the daemon sends
//! a hardware reconfiguration exactly when a call reports a change.

use imud_core::{ImudError, ImudResult};

/// Slots per bank; virtual sensor ids 0..32 are non-wake, 32..64 wake.
pub const BANK_SLOTS: usize = 32;
/// Total virtual-sensor id range.
pub const VIRTUAL_SENSOR_COUNT: usize = 2 * BANK_SLOTS;

/// The two independent subscription banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    NonWake,
    Wake,
}

/// Discrete sampling-rate codes understood by the hardware configuration
/// sink. Values are the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RateCode {
    /// On-change / one-shot sensors: no fixed rate.
    Disabled = 0,
    Hz400 = 1,
    Hz200 = 2,
    Hz100 = 3,
    Hz50 = 4,
    Hz25 = 5,
    Hz12_5 = 6,
    Hz6_25 = 7,
    Hz1 = 8,
    Hz0_5 = 9,
    Hz0_25 = 10,
    Hz0_125 = 11,
    Hz0_0625 = 12,
    Hz0_03125 = 13,
    Hz0_015625 = 14,
}

/// Map a sampling period to the rate code whose frequency band contains it.
///
/// `period_ns == 0` encodes the event-driven case.
#[must_use]
pub fn encode_rate(period_ns: i64) -> RateCode {
    if period_ns == 0 {
        return RateCode::Disabled;
    }
    let hz = 1_000_000_000.0_f64 / period_ns as f64;

    if hz > 200.0 {
        RateCode::Hz400
    } else if hz > 100.0 {
        RateCode::Hz200
    } else if hz > 50.0 {
        RateCode::Hz100
    } else if hz > 25.0 {
        RateCode::Hz50
    } else if hz > 12.0 {
        RateCode::Hz25
    } else if hz > 6.0 {
        RateCode::Hz12_5
    } else if hz > 1.0 {
        RateCode::Hz6_25
    } else if hz > 0.5 {
        RateCode::Hz1
    } else if hz > 0.25 {
        RateCode::Hz0_5
    } else if hz > 0.125 {
        RateCode::Hz0_25
    } else if hz > 0.0625 {
        RateCode::Hz0_125
    } else if hz > 0.03125 {
        RateCode::Hz0_0625
    } else if hz > 0.015625 {
        RateCode::Hz0_03125
    } else {
        RateCode::Hz0_015625
    }
}

/// Time unit selector for the 16-bit latency field. Values are the wire
/// encoding (upper two bits of the latency byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LatencyUnit {
    Ns = 0x00,
    Us = 0x40,
    Ms = 0x80,
    S = 0xc0,
}

/// Largest encodable latency: 16383 seconds.
pub const MAX_LATENCY_S: u16 = 16383;

/// Encode a report latency as the coarsest unit whose value fits 16 bits,
/// clamping at [`MAX_LATENCY_S`] seconds instead of overflowing.
#[must_use]
pub fn encode_latency(max_latency_ns: i64) -> (u16, LatencyUnit) {
    // Most used band first: milliseconds.
    if (1_000_000..1_000_000_000).contains(&max_latency_ns) {
        ((max_latency_ns / 1_000_000) as u16, LatencyUnit::Ms)
    } else if (1_000..1_000_000).contains(&max_latency_ns) {
        ((max_latency_ns / 1_000) as u16, LatencyUnit::Us)
    } else if max_latency_ns < 1_000 {
        (max_latency_ns.max(0) as u16, LatencyUnit::Ns)
    } else if max_latency_ns < 16_383_000_000_000 {
        ((max_latency_ns / 1_000_000_000) as u16, LatencyUnit::S)
    } else {
        (MAX_LATENCY_S, LatencyUnit::S)
    }
}

/// Per-virtual-sensor configuration record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigEntry {
    pub rate_code: RateCode,
    pub latency_unit: LatencyUnit,
    pub max_latency: u16,
    pub fifo_len: u16,
    pub on_change_hz: f32,
}

impl Default for ConfigEntry {
    /// Startup default: 50 Hz, 200 ms max latency.
    fn default() -> Self {
        Self {
            rate_code: RateCode::Hz50,
            latency_unit: LatencyUnit::Ms,
            max_latency: 200,
            fifo_len: 0,
            on_change_hz: 0.0,
        }
    }
}

/// One bank: the backing entries plus the sorted active-reference array.
///
/// Active references are slot indices into `entries`, kept sorted and
/// contiguous for `0..active_count`; trailing slots are `None`. Indices
/// order identically to the original's pointer arithmetic because entries
/// live in a fixed array.
#[derive(Debug)]
pub struct SensorBank {
    entries: [ConfigEntry; BANK_SLOTS],
    active: [Option<usize>; BANK_SLOTS],
    active_count: usize,
    on_change: [bool; BANK_SLOTS],
}

impl Default for SensorBank {
    fn default() -> Self {
        Self {
            entries: [ConfigEntry::default(); BANK_SLOTS],
            active: [None; BANK_SLOTS],
            active_count: 0,
            on_change: [false; BANK_SLOTS],
        }
    }
}

impl SensorBank {
    /// Enable or disable one slot, preserving active-array sort order.
    ///
    /// Returns `true` exactly when the active set changed: duplicate
    /// enables and absent disables are no-ops.
    pub fn activate(&mut self, slot: usize, enable: bool) -> bool {
        for i in 0..BANK_SLOTS {
            let Some(current) = self.active[i] else {
                // Hit the blank tail without finding the slot.
                if enable {
                    self.active[i] = Some(slot);
                    self.active_count += 1;
                    return true;
                }
                return false;
            };

            if slot > current {
                continue;
            }
            if slot == current {
                if enable {
                    return false;
                }
                self.active_count -= 1;
                for j in i..self.active_count {
                    self.active[j] = self.active[j + 1];
                }
                self.active[self.active_count] = None;
                return true;
            }
            // slot < current: sorted insertion point.
            if enable {
                for j in (i..self.active_count).rev() {
                    self.active[j + 1] = self.active[j];
                }
                self.active[i] = Some(slot);
                self.active_count += 1;
                return true;
            }
            return false;
        }
        false
    }

    /// Rewrite the rate/latency encoding for one slot.
    ///
    /// Returns `true` when the slot is currently active (the hardware must
    /// be reconfigured); an inactive slot is pre-staged in place and needs
    /// no immediate hardware action.
    pub fn batch_update(
        &mut self,
        slot: usize,
        period_ns: i64,
        max_latency_ns: i64,
        on_change_hz: f32,
    ) -> bool {
        let rate_code = encode_rate(period_ns);
        let (max_latency, latency_unit) = encode_latency(max_latency_ns);
        // Samples the batching FIFO holds over one latency window at the
        // requested rate; zero for event-driven and unbatched requests.
        let fifo_len = if period_ns > 0 && max_latency_ns > 0 {
            (max_latency_ns / period_ns).min(i64::from(u16::MAX)) as u16
        } else {
            0
        };

        let entry = &mut self.entries[slot];
        entry.rate_code = rate_code;
        entry.latency_unit = latency_unit;
        entry.max_latency = max_latency;
        entry.fifo_len = fifo_len;
        entry.on_change_hz = on_change_hz;

        self.active[..self.active_count]
            .iter()
            .any(|&a| a == Some(slot))
    }

    /// Flag a slot as an on-change sensor: rate requests for it are
    /// expressed as an event frequency instead of a sampling rate code.
    pub fn mark_on_change(&mut self, slot: usize) {
        self.on_change[slot] = true;
    }

    #[must_use]
    pub fn is_on_change(&self, slot: usize) -> bool {
        self.on_change[slot]
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    #[must_use]
    pub fn is_active(&self, slot: usize) -> bool {
        self.active[..self.active_count]
            .iter()
            .any(|&a| a == Some(slot))
    }

    /// Active slot indices in sorted order.
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.active[..self.active_count].iter().flatten().copied()
    }

    #[must_use]
    pub fn entry(&self, slot: usize) -> &ConfigEntry {
        &self.entries[slot]
    }
}

/// Both banks plus id-range bookkeeping; the unit the daemon locks.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    nonwake: SensorBank,
    wake: SensorBank,
}

impl SubscriptionTable {
    fn locate(id: i32) -> ImudResult<(Bank, usize)> {
        let Ok(id) = usize::try_from(id) else {
            return Err(ImudError::UnknownSensor(id));
        };
        if id < BANK_SLOTS {
            Ok((Bank::NonWake, id))
        } else if id < VIRTUAL_SENSOR_COUNT {
            Ok((Bank::Wake, id - BANK_SLOTS))
        } else {
            Err(ImudError::UnknownSensor(id as i32))
        }
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut SensorBank {
        match bank {
            Bank::NonWake => &mut self.nonwake,
            Bank::Wake => &mut self.wake,
        }
    }

    #[must_use]
    pub fn bank(&self, bank: Bank) -> &SensorBank {
        match bank {
            Bank::NonWake => &self.nonwake,
            Bank::Wake => &self.wake,
        }
    }

    /// Enable or disable a virtual sensor; `Ok(true)` means the hardware
    /// configuration must be resent.
    pub fn activate(&mut self, id: i32, enable: bool) -> ImudResult<bool> {
        let (bank, slot) = Self::locate(id)?;
        Ok(self.bank_mut(bank).activate(slot, enable))
    }

    /// Update a virtual sensor's batching parameters; `Ok(true)` means the
    /// sensor is active and the hardware configuration must be resent.
    pub fn set_batch(
        &mut self,
        id: i32,
        period_ns: i64,
        max_latency_ns: i64,
        on_change_hz: f32,
    ) -> ImudResult<bool> {
        let (bank, slot) = Self::locate(id)?;
        Ok(self
            .bank_mut(bank)
            .batch_update(slot, period_ns, max_latency_ns, on_change_hz))
    }

    pub fn entry(&self, id: i32) -> ImudResult<&ConfigEntry> {
        let (bank, slot) = Self::locate(id)?;
        Ok(self.bank(bank).entry(slot))
    }

    pub fn is_active(&self, id: i32) -> ImudResult<bool> {
        let (bank, slot) = Self::locate(id)?;
        Ok(self.bank(bank).is_active(slot))
    }

    /// Flag a virtual sensor as on-change.
    pub fn mark_on_change(&mut self, id: i32) -> ImudResult<()> {
        let (bank, slot) = Self::locate(id)?;
        self.bank_mut(bank).mark_on_change(slot);
        Ok(())
    }

    pub fn is_on_change(&self, id: i32) -> ImudResult<bool> {
        let (bank, slot) = Self::locate(id)?;
        Ok(self.bank(bank).is_on_change(slot))
    }
}

/// Where rate-code and enable writes go: per-sensor string-valued
/// configuration endpoints. The transport (sysfs, iio, vendor FIFO) is an
/// external concern.
pub trait ConfigSink: Send {
    fn write_config(&mut self, endpoint: &str, key: &str, value: &str) -> ImudResult<()>;
}

/// Config sink that records every write; used in tests and the demo.
#[derive(Debug, Default)]
pub struct RecordingConfigSink {
    pub writes: Vec<(String, String, String)>,
}

impl ConfigSink for RecordingConfigSink {
    fn write_config(&mut self, endpoint: &str, key: &str, value: &str) -> ImudResult<()> {
        self.writes
            .push((endpoint.to_owned(), key.to_owned(), value.to_owned()));
        Ok(())
    }
}

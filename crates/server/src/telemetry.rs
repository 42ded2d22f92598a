//! Telemetry intake and the `data_monitor` broadcaster.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::{
    frame::{FrameDecoder, InputFlags, OutputFlags, Telemetry, ACK_BYTE},
    protocol::{format_timestamp, PlantReading, ServerEvent},
};
use tokio::{
    fs::OpenOptions,
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::broadcast,
};
use tracing::{debug, info, warn};

use crate::{
    app_state::FeedStatus,
    config::{Settings, SourceKind},
};

#[async_trait]
pub trait TelemetrySource: Send {
    /// Next reading, or `None` once the source has ended.
    async fn next_telemetry(&mut self) -> Result<Option<Telemetry>>;
}

/// Tank heights used to turn raw centimetres into fill percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankHeights {
    pub tank1_cm: f64,
    pub tank2_cm: f64,
}

/// Rounds half to even. A non-positive height yields 0.
pub fn level_percent(raw_cm: u8, height_cm: f64) -> i64 {
    if height_cm <= 0.0 || !height_cm.is_finite() {
        return 0;
    }
    (f64::from(raw_cm) / height_cm * 100.0).round_ties_even() as i64
}

pub fn to_reading(id: u64, telemetry: &Telemetry, heights: TankHeights, timestamp: String) -> PlantReading {
    let flag = |on: bool| u8::from(on);
    let InputFlags {
        level_switch,
        mode_standby,
        mode_filtering,
        mode_backwash,
        mode_drain,
        mode_override,
        emergency_stop,
        ..
    } = telemetry.inputs;
    let OutputFlags {
        solenoids, pumps, ..
    } = telemetry.outputs;

    PlantReading {
        id,
        timestamp,
        level1: level_percent(telemetry.level_1, heights.tank1_cm),
        level2: level_percent(telemetry.level_2, heights.tank2_cm),
        tds_value: i64::from(telemetry.tds),
        flow_rate: i64::from(telemetry.flow),
        pressure_value: i64::from(telemetry.pressure),
        level_switch: flag(level_switch),
        mode_standby: flag(mode_standby),
        mode_filtering: flag(mode_filtering),
        mode_backwash: flag(mode_backwash),
        mode_drain: flag(mode_drain),
        mode_override: flag(mode_override),
        emergency_stop: flag(emergency_stop),
        solenoid1: flag(solenoids[0]),
        solenoid2: flag(solenoids[1]),
        solenoid3: flag(solenoids[2]),
        solenoid4: flag(solenoids[3]),
        solenoid5: flag(solenoids[4]),
        solenoid6: flag(solenoids[5]),
        pump1: flag(pumps[0]),
        pump2: flag(pumps[1]),
        pump3: flag(pumps[2]),
    }
}

/// Publishes every reading from `source` as `data_monitor` until the source
/// ends. Ids start at 1 and increase by one per reading.
pub async fn run_feed(
    mut source: Box<dyn TelemetrySource>,
    events: broadcast::Sender<ServerEvent>,
    status: Arc<FeedStatus>,
    heights: TankHeights,
) -> Result<()> {
    let mut next_id = 0u64;
    while let Some(telemetry) = source.next_telemetry().await? {
        next_id += 1;
        let reading = to_reading(
            next_id,
            &telemetry,
            heights,
            format_timestamp(Local::now().naive_local()),
        );
        status.record_reading(next_id);
        // send only fails while no dashboard is subscribed
        let receivers = events.send(ServerEvent::DataMonitor(reading)).unwrap_or(0);
        debug!(id = next_id, receivers, "reading published");
    }
    info!(readings = next_id, "telemetry source ended");
    Ok(())
}

pub async fn open_source(settings: &Settings) -> Result<Box<dyn TelemetrySource>> {
    match settings.source {
        SourceKind::Simulator => {
            info!(interval_ms = settings.poll_interval_ms, "using simulated telemetry");
            Ok(Box::new(SimulatorSource::new(Duration::from_millis(
                settings.poll_interval_ms,
            ))))
        }
        SourceKind::Device => {
            let source = DeviceSource::open(&settings.device_path).await?;
            info!(device = %settings.device_path, "reading telemetry frames");
            Ok(Box::new(source))
        }
    }
}

/// Random plant state at a fixed interval: levels up to 100 cm and 80 cm,
/// every flag a coin toss.
pub struct SimulatorSource {
    interval: Duration,
    rng: StdRng,
}

impl SimulatorSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    pub fn seeded(interval: Duration, seed: u64) -> Self {
        Self {
            interval,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample(&mut self) -> Telemetry {
        let rng = &mut self.rng;
        let level_1 = rng.gen_range(0..=100);
        Telemetry {
            level_1,
            level_2: rng.gen_range(0..=80),
            tds: level_1,
            flow: level_1,
            pressure: level_1,
            inputs: InputFlags {
                level_switch: rng.gen(),
                pb_start: false,
                mode_standby: rng.gen(),
                mode_filtering: rng.gen(),
                mode_backwash: rng.gen(),
                mode_drain: rng.gen(),
                mode_override: rng.gen(),
                emergency_stop: rng.gen(),
            },
            outputs: OutputFlags {
                solenoids: std::array::from_fn(|_| rng.gen()),
                pumps: std::array::from_fn(|_| rng.gen()),
                ..OutputFlags::default()
            },
        }
    }
}

#[async_trait]
impl TelemetrySource for SimulatorSource {
    async fn next_telemetry(&mut self) -> Result<Option<Telemetry>> {
        tokio::time::sleep(self.interval).await;
        Ok(Some(self.sample()))
    }
}

/// Frames read from the microcontroller link. Each accepted frame is
/// acknowledged with [`ACK_BYTE`]; rejected frames are logged and skipped.
pub struct DeviceSource<IO> {
    io: IO,
    decoder: FrameDecoder,
    buf: [u8; 64],
}

impl DeviceSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open telemetry device '{}'", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<IO> DeviceSource<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: IO) -> Self {
        Self {
            io,
            decoder: FrameDecoder::new(),
            buf: [0; 64],
        }
    }
}

#[async_trait]
impl<IO> TelemetrySource for DeviceSource<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_telemetry(&mut self) -> Result<Option<Telemetry>> {
        loop {
            while let Some(frame) = self.decoder.next_frame() {
                match frame {
                    Ok(telemetry) => {
                        self.io
                            .write_all(&[ACK_BYTE])
                            .await
                            .context("failed to acknowledge telemetry frame")?;
                        return Ok(Some(telemetry));
                    }
                    Err(err) => warn!(%err, "rejected telemetry frame"),
                }
            }

            let read = self
                .io
                .read(&mut self.buf)
                .await
                .context("failed to read telemetry device")?;
            if read == 0 {
                return Ok(None);
            }
            self.decoder.push(&self.buf[..read]);
        }
    }
}

#[cfg(test)]
#[path = "tests/telemetry_tests.rs"]
mod tests;

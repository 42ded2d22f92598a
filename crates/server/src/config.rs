use std::{collections::HashMap, fs, str::FromStr};

use anyhow::anyhow;
use tracing::warn;

use crate::telemetry::TankHeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Simulator,
    Device,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simulator" => Ok(SourceKind::Simulator),
            "device" => Ok(SourceKind::Device),
            other => Err(anyhow!("unknown telemetry source '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub source: SourceKind,
    pub device_path: String,
    pub poll_interval_ms: u64,
    pub tank1_height_cm: f64,
    pub tank2_height_cm: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:5000".into(),
            source: SourceKind::Simulator,
            device_path: "/dev/serial0".into(),
            poll_interval_ms: 500,
            tank1_height_cm: 100.0,
            tank2_height_cm: 80.0,
        }
    }
}

impl Settings {
    pub fn tank_heights(&self) -> TankHeights {
        TankHeights {
            tank1_cm: self.tank1_height_cm,
            tank2_cm: self.tank2_height_cm,
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment overrides.
pub(crate) fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                let file_value = |key: &str| file_cfg.get(key).cloned();
                apply("bind_addr", file_value("bind_addr"), &mut settings);
                apply("source", file_value("source"), &mut settings);
                apply("device_path", file_value("device_path"), &mut settings);
                apply("poll_interval_ms", file_value("poll_interval_ms"), &mut settings);
                apply("tank1_height_cm", file_value("tank1_height_cm"), &mut settings);
                apply("tank2_height_cm", file_value("tank2_height_cm"), &mut settings);
            }
            Err(err) => warn!(%err, "ignoring unreadable server.toml"),
        }
    }

    apply("bind_addr", env("WTP_BIND"), &mut settings);
    apply("bind_addr", env("APP__BIND_ADDR"), &mut settings);
    apply("source", env("APP__SOURCE"), &mut settings);
    apply("device_path", env("APP__DEVICE_PATH"), &mut settings);
    apply("poll_interval_ms", env("APP__POLL_INTERVAL_MS"), &mut settings);
    apply("tank1_height_cm", env("APP__TANK1_HEIGHT_CM"), &mut settings);
    apply("tank2_height_cm", env("APP__TANK2_HEIGHT_CM"), &mut settings);

    settings
}

fn apply(key: &str, value: Option<String>, settings: &mut Settings) {
    let Some(value) = value else {
        return;
    };
    match key {
        "bind_addr" => settings.server_bind = value,
        "device_path" => settings.device_path = value,
        "source" => match value.parse() {
            Ok(source) => settings.source = source,
            Err(err) => warn!(%err, "ignoring source override"),
        },
        "poll_interval_ms" => {
            if let Ok(parsed) = value.trim().parse::<u64>() {
                settings.poll_interval_ms = parsed;
            }
        }
        "tank1_height_cm" => {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                settings.tank1_height_cm = parsed;
            }
        }
        "tank2_height_cm" => {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                settings.tank2_height_cm = parsed;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

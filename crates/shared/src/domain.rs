use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! wire_keys {
    ($name:ident { $($variant:ident => $key:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Key of this field in a `data_monitor` payload.
            pub fn key(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

wire_keys!(Tank {
    Level1 => "level1",
    Level2 => "level2",
});

wire_keys!(Indicator {
    ModeFiltering => "mode_filtering",
    ModeStandby => "mode_standby",
    ModeBackwash => "mode_backwash",
    ModeDrain => "mode_drain",
    ModeOverride => "mode_override",
    Pump1 => "pump1",
    Pump2 => "pump2",
    Pump3 => "pump3",
    Solenoid1 => "solenoid1",
    Solenoid2 => "solenoid2",
    Solenoid3 => "solenoid3",
    Solenoid4 => "solenoid4",
    Solenoid5 => "solenoid5",
    Solenoid6 => "solenoid6",
});

impl Tank {
    pub fn label(self) -> &'static str {
        match self {
            Tank::Level1 => "agitator",
            Tank::Level2 => "storage",
        }
    }
}

impl Indicator {
    pub fn label(self) -> &'static str {
        match self {
            Indicator::ModeFiltering => "filtering",
            Indicator::ModeStandby => "standby",
            Indicator::ModeBackwash => "backwash",
            Indicator::ModeDrain => "drain",
            Indicator::ModeOverride => "override",
            Indicator::Pump1 => "pump 1",
            Indicator::Pump2 => "pump 2",
            Indicator::Pump3 => "pump 3",
            Indicator::Solenoid1 => "valve 1",
            Indicator::Solenoid2 => "valve 2",
            Indicator::Solenoid3 => "valve 3",
            Indicator::Solenoid4 => "valve 4",
            Indicator::Solenoid5 => "valve 5",
            Indicator::Solenoid6 => "valve 6",
        }
    }
}

/// Two-state visual category of a boolean-state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Active,
    Inactive,
}

impl Category {
    /// Strict equality to the number 1.
    ///
    /// Any JSON number equal to 1 (`1`, `1.0`) is active. Strings, booleans,
    /// `null` and every other number are inactive; nothing is coerced.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.as_f64() == Some(1.0) => Category::Active,
            _ => Category::Inactive,
        }
    }

    /// Class name the plant dashboard styles against.
    pub fn class_name(self) -> &'static str {
        match self {
            Category::Active => "true",
            Category::Inactive => "false",
        }
    }
}

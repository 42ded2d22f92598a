//! Maps inbound plant snapshots onto bound visual elements.
//!
//! Levels become a fill extent plus a text label, both `"<value>%"` with the
//! value passed through untouched. Every other recognised field becomes a
//! [`Category`] by strict equality to 1. Fields absent from a snapshot leave
//! their element as it was; unrecognised fields are ignored.

use std::collections::BTreeMap;

use serde_json::Value;
use shared::{
    domain::{Category, Indicator, Tank},
    protocol::{Snapshot, DATA_MONITOR},
};
use tracing::trace;

use crate::EventChannel;

/// A tank level element: fill bar plus text label.
pub trait Gauge {
    fn set_fill(&mut self, extent: &str);
    fn set_label(&mut self, text: &str);
}

/// A two-state indicator element.
pub trait Lamp {
    fn set_category(&mut self, category: Category);
}

/// Elements the projector writes to, bound once at startup.
pub struct Bindings<G, L> {
    gauges: BTreeMap<Tank, G>,
    lamps: BTreeMap<Indicator, L>,
}

impl<G, L> Bindings<G, L> {
    pub fn from_fn(
        mut gauge: impl FnMut(Tank) -> G,
        mut lamp: impl FnMut(Indicator) -> L,
    ) -> Self {
        Self {
            gauges: Tank::ALL.iter().map(|tank| (*tank, gauge(*tank))).collect(),
            lamps: Indicator::ALL
                .iter()
                .map(|indicator| (*indicator, lamp(*indicator)))
                .collect(),
        }
    }

    pub fn gauge(&self, tank: Tank) -> Option<&G> {
        self.gauges.get(&tank)
    }

    pub fn lamp(&self, indicator: Indicator) -> Option<&L> {
        self.lamps.get(&indicator)
    }
}

pub struct StateProjector<G, L> {
    bindings: Bindings<G, L>,
}

impl<G: Gauge, L: Lamp> StateProjector<G, L> {
    pub fn new(bindings: Bindings<G, L>) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &Bindings<G, L> {
        &self.bindings
    }

    pub fn on_snapshot(&mut self, snapshot: &Snapshot) {
        for (tank, gauge) in self.bindings.gauges.iter_mut() {
            if let Some(value) = snapshot.level(*tank) {
                let text = format!("{}%", level_text(value));
                gauge.set_fill(&text);
                gauge.set_label(&text);
            }
        }

        for (indicator, lamp) in self.bindings.lamps.iter_mut() {
            if let Some(value) = snapshot.indicator(*indicator) {
                lamp.set_category(Category::from_value(value));
            }
        }

        trace!(fields = snapshot.len(), "snapshot projected");
    }
}

impl<G, L> StateProjector<G, L>
where
    G: Gauge + Send + 'static,
    L: Lamp + Send + 'static,
{
    /// Subscribe the projector to `data_monitor` events on `channel`.
    pub fn attach(mut self, channel: &dyn EventChannel) {
        channel.on_event(
            DATA_MONITOR,
            Box::new(move |data| self.on_snapshot(&Snapshot::from_value(data))),
        );
    }
}

/// Text of a level value as a browser would concatenate it.
///
/// Integral numbers print without a fraction, other numbers keep their digits,
/// strings are used as-is and anything else prints as JSON. Floats outside
/// roughly 1e-7..1e21 print in positional form, not JavaScript's exponent form.
pub fn level_text(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64() {
                f.to_string()
            } else {
                n.to_string()
            }
        }
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/projector_tests.rs"]
mod tests;

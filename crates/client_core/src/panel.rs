//! Terminal plant panel: the visual surface the dashboard binds the projector to.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::{Category, Indicator, Tank};

use crate::projector::{Bindings, Gauge, Lamp};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GaugeView {
    pub fill: Option<String>,
    pub label: Option<String>,
}

/// What the panel currently shows. Elements never written stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelView {
    pub gauges: BTreeMap<Tank, GaugeView>,
    pub lamps: BTreeMap<Indicator, Category>,
}

#[derive(Debug, Clone, Default)]
pub struct Panel {
    view: Arc<Mutex<PanelView>>,
}

pub struct PanelGauge {
    tank: Tank,
    view: Arc<Mutex<PanelView>>,
}

pub struct PanelLamp {
    indicator: Indicator,
    view: Arc<Mutex<PanelView>>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bindings(&self) -> Bindings<PanelGauge, PanelLamp> {
        Bindings::from_fn(
            |tank| PanelGauge {
                tank,
                view: Arc::clone(&self.view),
            },
            |indicator| PanelLamp {
                indicator,
                view: Arc::clone(&self.view),
            },
        )
    }

    pub fn view(&self) -> PanelView {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn render(&self) -> String {
        render_view(&self.view())
    }
}

impl Gauge for PanelGauge {
    fn set_fill(&mut self, extent: &str) {
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        view.gauges.entry(self.tank).or_default().fill = Some(extent.to_string());
    }

    fn set_label(&mut self, text: &str) {
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        view.gauges.entry(self.tank).or_default().label = Some(text.to_string());
    }
}

impl Lamp for PanelLamp {
    fn set_category(&mut self, category: Category) {
        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lamps
            .insert(self.indicator, category);
    }
}

/// Cells filled for a fill extent such as `"45%"`. The bar is clamped for
/// drawing only; the label keeps the raw value.
fn bar_cells(extent: &str) -> usize {
    let percent = extent
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .unwrap_or(0.0);
    if !percent.is_finite() {
        return 0;
    }
    let cells = (percent.clamp(0.0, 100.0) / 100.0 * BAR_WIDTH as f64).round();
    cells as usize
}

fn lamp_glyph(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Active) => "[ON ]",
        Some(Category::Inactive) => "[off]",
        None => "[ ? ]",
    }
}

pub fn render_view(view: &PanelView) -> String {
    let mut out = String::new();

    for tank in Tank::ALL {
        let gauge = view.gauges.get(tank).cloned().unwrap_or_default();
        let filled = gauge.fill.as_deref().map(bar_cells).unwrap_or(0);
        let _ = writeln!(
            out,
            "{:<9} [{}{}] {}",
            tank.label(),
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            gauge.label.as_deref().unwrap_or("--")
        );
    }

    let rows: [(&str, &[Indicator]); 3] = [
        ("modes", &Indicator::ALL[..5]),
        ("pumps", &Indicator::ALL[5..8]),
        ("valves", &Indicator::ALL[8..]),
    ];
    for (title, indicators) in rows {
        let cells: Vec<String> = indicators
            .iter()
            .map(|indicator| {
                format!(
                    "{} {}",
                    indicator.label(),
                    lamp_glyph(view.lamps.get(indicator).copied())
                )
            })
            .collect();
        let _ = writeln!(out, "{title:<9} {}", cells.join("  "));
    }

    out
}

//! Host configuration for an automaton display.
//!
//! Deserialized from JSON; every field has a default so partial files work.
//! The three variants match where the automaton is shown: the page
//! background, the header banner (cycling rules, breathing alpha) and the
//! interactive demo widget.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compute::BackendPreference;
use crate::error::{CaError, ConfigError};
use crate::render::{Breathing, RenderStyle};
use crate::rules::NAMED_RULES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Background,
    Header,
    Demo,
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "background" => Ok(Variant::Background),
            "header" => Ok(Variant::Header),
            "demo" => Ok(Variant::Demo),
            other => Err(format!("unknown variant '{other}' (expected background, header or demo)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cells per row
    pub cols: usize,
    /// Generations shown before the animation completes
    pub rows: usize,
    /// Cell edge length in pixels
    pub cell_size: f32,
    pub tick_interval_ms: u64,
    /// Signed so that out-of-range numbers are reported as invalid rules
    /// rather than parse errors
    pub initial_rule: i64,
    pub cycling_enabled: bool,
    pub rule_change_delay_ms: u64,
    /// Rules a cycling display may switch to; all 256 when absent
    pub cycle_rules: Option<Vec<u8>>,
    pub backend: BackendPreference,
    pub style: RenderStyle,
    /// Pulsing alpha; the header variant enables it
    pub breathing: Option<Breathing>,
    /// Seed for rule picks; random when absent
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config::for_variant(Variant::Background)
    }
}

impl Config {
    pub fn for_variant(variant: Variant) -> Self {
        let base = Config {
            cols: 160,
            rows: 90,
            cell_size: 10.0,
            tick_interval_ms: 150,
            initial_rule: 30,
            cycling_enabled: false,
            rule_change_delay_ms: 1800,
            cycle_rules: None,
            backend: BackendPreference::Auto,
            style: RenderStyle::default(),
            breathing: None,
            seed: None,
        };
        match variant {
            Variant::Background => base,
            Variant::Header => Config {
                cols: 200,
                rows: 24,
                cell_size: 6.0,
                cycling_enabled: true,
                cycle_rules: Some(NAMED_RULES.iter().map(|r| r.number).collect()),
                breathing: Some(Breathing::default()),
                style: RenderStyle {
                    min_age_factor: 0.3,
                    ..RenderStyle::default()
                },
                ..base
            },
            Variant::Demo => Config {
                cols: 81,
                rows: 40,
                cell_size: 8.0,
                tick_interval_ms: 200,
                initial_rule: 90,
                backend: BackendPreference::Cpu,
                style: RenderStyle {
                    distance_fade: 0.0,
                    ..RenderStyle::default()
                },
                ..base
            },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CaError> {
        if !(0..=255).contains(&self.initial_rule) {
            return Err(CaError::InvalidRule(self.initial_rule));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(CaError::Dimension {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(CaError::Config("tick_interval_ms must be positive".into()));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(CaError::Config(format!("cell_size must be positive, got {}", self.cell_size)));
        }
        if matches!(&self.cycle_rules, Some(rules) if rules.is_empty()) {
            return Err(CaError::Config("cycle_rules must not be empty".into()));
        }

        let style = &self.style;
        for (name, value) in [
            ("style.min_age_factor", style.min_age_factor),
            ("style.min_distance_factor", style.min_distance_factor),
            ("style.alpha", style.alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CaError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if !(style.age_fade_factor > 0.0) {
            return Err(CaError::Config("style.age_fade_factor must be positive".into()));
        }
        if style.distance_fade < 0.0 {
            return Err(CaError::Config("style.distance_fade must not be negative".into()));
        }
        Ok(())
    }

    /// Cells that fit in a `width` x `height` pixel surface
    pub fn grid_for_surface(&self, width: u32, height: u32) -> (usize, usize) {
        let cols = (width as f32 / self.cell_size).floor() as usize;
        let rows = (height as f32 / self.cell_size).floor() as usize;
        (cols, rows)
    }
}

//! Immutable per-run settings handed to the renderers.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::AcheError;

pub const DEFAULT_REPORT_SUFFIX: &str = "_envelope_report";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub chart_width: u32,
    pub chart_height: u32,
    /// Appended to the input stem to name the report workbook.
    pub report_suffix: String,
    /// Fan rated power (kW) for the fan-power chart.
    pub rated_power_kw: Option<f64>,
    /// Design air cooler duty (kcal/hr).
    pub design_duty: Option<f64>,
    /// Design UA (kcal/hr.m².°C).
    pub design_ua: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chart_width: 1120,
            chart_height: 640,
            report_suffix: DEFAULT_REPORT_SUFFIX.to_string(),
            rated_power_kw: None,
            design_duty: None,
            design_ua: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(text: &str) -> Result<Self, AcheError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| AcheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AcheError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), AcheError> {
        if self.chart_width < 200 || self.chart_height < 150 {
            return Err(AcheError::Config(format!(
                "chart size {}x{} is too small",
                self.chart_width, self.chart_height
            )));
        }
        if self.report_suffix.contains(['/', '\\']) {
            return Err(AcheError::Config(
                "report suffix must not contain path separators".into(),
            ));
        }
        for (name, value) in [
            ("rated_power_kw", self.rated_power_kw),
            ("design_duty", self.design_duty),
            ("design_ua", self.design_ua),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(AcheError::Config(format!("{name} must be positive, got {v}")));
                }
            }
        }
        Ok(())
    }

    /// Thresholds needed by the performance charts; all three must be set.
    pub fn design_thresholds(&self) -> Result<DesignThresholds, AcheError> {
        let missing = |name: &str| AcheError::InvalidParameter(format!("{name} is required"));
        Ok(DesignThresholds {
            rated_power_kw: self.rated_power_kw.ok_or_else(|| missing("rated power"))?,
            design_duty: self.design_duty.ok_or_else(|| missing("design duty"))?,
            design_ua: self.design_ua.ok_or_else(|| missing("design UA"))?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesignThresholds {
    pub rated_power_kw: f64,
    pub design_duty: f64,
    pub design_ua: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json_str(r#"{ "design_ua": 5200.0 }"#).expect("config");
        assert_eq!(config.design_ua, Some(5200.0));
        assert_eq!(config.chart_width, 1120);
        assert_eq!(config.report_suffix, DEFAULT_REPORT_SUFFIX);
    }

    #[test]
    fn rejects_non_positive_thresholds() {
        let err = AnalysisConfig::from_json_str(r#"{ "rated_power_kw": -3 }"#).unwrap_err();
        assert!(matches!(err, AcheError::Config(msg) if msg.contains("rated_power_kw")));
    }

    #[test]
    fn rejects_tiny_charts_and_bad_json() {
        assert!(AnalysisConfig::from_json_str(r#"{ "chart_width": 10 }"#).is_err());
        assert!(AnalysisConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn thresholds_require_all_values() {
        let mut config = AnalysisConfig {
            rated_power_kw: Some(30.0),
            design_duty: Some(3_350_000.0),
            ..AnalysisConfig::default()
        };
        assert!(config.design_thresholds().is_err());
        config.design_ua = Some(4000.0);
        assert_eq!(
            config.design_thresholds().expect("thresholds"),
            DesignThresholds {
                rated_power_kw: 30.0,
                design_duty: 3_350_000.0,
                design_ua: 4000.0,
            }
        );
    }
}

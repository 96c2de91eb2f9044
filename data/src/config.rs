use serde::{Deserialize, Serialize};

/// What the per-cell labels show.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// bid x ask volume
    #[default]
    Split,
    /// signed per-cell delta
    Delta,
    /// dominant-side ratio
    #[serde(rename = "imbalance")]
    ImbalancePercent,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Dark,
    Light,
}

fn default_cell_height() -> f32 {
    14.0
}

fn default_volume_threshold() -> f32 {
    0.0
}

fn default_max_bars() -> usize {
    120
}

fn default_show_poc() -> bool {
    true
}

fn default_show_cumulative_delta() -> bool {
    false
}

fn default_tick_multiplier() -> u16 {
    1
}

/// Configuration record read by every downstream stage. Supplied
/// externally; the core treats it as read-only.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FootprintSettings {
    /// Target pixel height of one price level; decides how many levels the
    /// price scale fits into the viewport.
    #[serde(default = "default_cell_height")]
    pub cell_height: f32,
    #[serde(default)]
    pub color_scheme: ColorScheme,
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Cells below this traded volume render without a label.
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f32,
    #[serde(default = "default_max_bars")]
    pub max_bars: usize,
    #[serde(rename = "showPOC", default = "default_show_poc")]
    pub show_poc: bool,
    #[serde(default = "default_show_cumulative_delta")]
    pub show_cumulative_delta: bool,
    /// Groups price levels into coarser cells: cell step = tick size times
    /// this multiplier.
    #[serde(default = "default_tick_multiplier")]
    pub tick_multiplier: u16,
}

impl Default for FootprintSettings {
    fn default() -> Self {
        Self {
            cell_height: default_cell_height(),
            color_scheme: ColorScheme::default(),
            display_mode: DisplayMode::default(),
            volume_threshold: default_volume_threshold(),
            max_bars: default_max_bars(),
            show_poc: default_show_poc(),
            show_cumulative_delta: default_show_cumulative_delta(),
            tick_multiplier: default_tick_multiplier(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_external_shape() {
        let settings: FootprintSettings = serde_json::from_str(
            r#"{
                "cellHeight": 18.0,
                "colorScheme": "light",
                "displayMode": "imbalance",
                "volumeThreshold": 500,
                "maxBars": 60,
                "showPOC": false,
                "showCumulativeDelta": true
            }"#,
        )
        .unwrap();

        assert_eq!(settings.cell_height, 18.0);
        assert_eq!(settings.color_scheme, ColorScheme::Light);
        assert_eq!(settings.display_mode, DisplayMode::ImbalancePercent);
        assert_eq!(settings.volume_threshold, 500.0);
        assert_eq!(settings.max_bars, 60);
        assert!(!settings.show_poc);
        assert!(settings.show_cumulative_delta);
        assert_eq!(settings.tick_multiplier, 1);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: FootprintSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, FootprintSettings::default());
    }
}

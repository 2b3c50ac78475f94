use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    /// Base snap grid for interactive placement.
    pub snap_grid: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            snap_grid: 8.0,
        }
    }
}

/// Sizing and spacing for the sequential scan-grid placement of new entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub entity_width: f64,
    pub entity_height: f64,
    pub padding: f64,
    pub margin: f64,
    /// Detailed-mode base box size before content adjustments.
    pub detailed_base_width: f64,
    pub detailed_base_height: f64,
    pub width_per_name_char: f64,
    pub max_width_adjustment: f64,
    pub height_per_attribute: f64,
    pub max_height_adjustment: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            entity_width: 200.0,
            entity_height: 80.0,
            padding: 40.0,
            margin: 40.0,
            detailed_base_width: 200.0,
            detailed_base_height: 120.0,
            width_per_name_char: 2.0,
            max_width_adjustment: 60.0,
            height_per_attribute: 8.0,
            max_height_adjustment: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    pub grid_cell_size: f64,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
    pub top_padding: f64,
    pub left_padding: f64,
    /// Minimum horizontal allocation per entity within a layer.
    pub min_spacing: f64,
    pub max_barycenter_passes: usize,
    pub high_connectivity_threshold: usize,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            grid_cell_size: 200.0,
            horizontal_spacing: 250.0,
            vertical_spacing: 300.0,
            top_padding: 100.0,
            left_padding: 150.0,
            min_spacing: 200.0,
            max_barycenter_passes: 10,
            high_connectivity_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub grid_size: f64,
    pub entity_spacing: f64,
    pub link_strength: f64,
    pub link_distance: f64,
    pub charge_strength: f64,
    pub iterations: usize,
    pub orthogonal_bias: bool,
    pub orthogonal_bias_strength: f64,
    pub center_strength: f64,
    pub collide_strength: f64,
    /// How often (in iterations) positions are checked for numeric blow-up.
    pub validity_check_interval: usize,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            grid_size: 40.0,
            entity_spacing: 180.0,
            link_strength: 0.5,
            link_distance: 200.0,
            charge_strength: -300.0,
            iterations: 300,
            orthogonal_bias: true,
            orthogonal_bias_strength: 0.3,
            center_strength: 0.05,
            collide_strength: 0.8,
            validity_check_interval: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartConfig {
    pub grid_spacing: f64,
    pub center_offset: f64,
    /// Fraction of grid_spacing around the anchor reserved for the anchor.
    pub center_exclusion: f64,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            grid_spacing: 180.0,
            center_offset: 40.0,
            center_exclusion: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub placement: PlacementConfig,
    pub hierarchical: HierarchicalConfig,
    pub force: ForceConfig,
    pub smart: SmartConfig,
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.force.iterations, 300);
        assert_eq!(config.hierarchical.grid_cell_size, 200.0);
        assert_eq!(config.canvas.snap_grid, 8.0);
    }

    #[test]
    fn partial_config_fills_remaining_sections() {
        let config: Config =
            serde_json::from_str(r#"{ "force": { "iterations": 120 } }"#).unwrap();
        assert_eq!(config.force.iterations, 120);
        assert_eq!(config.force.grid_size, 40.0);
        assert_eq!(config.smart.grid_spacing, 180.0);
    }
}

use crate::types::DatasetLabel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub server: ServerConfig,
    pub trend: TrendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_dir: PathBuf,
    /// Years the dashboard offers in the dataset selector.
    pub years: Vec<i32>,
    /// File name pattern for per-year datasets; `{year}` is substituted.
    pub year_pattern: String,
    pub cumulative_file: String,
}

impl InputConfig {
    /// Resolve the file behind a selection. Uploaded data has no file, and a
    /// year outside the configured list is not a valid selection either.
    pub fn dataset_path(&self, label: &DatasetLabel) -> Option<PathBuf> {
        match label {
            DatasetLabel::Year(year) => {
                if !self.years.contains(year) {
                    return None;
                }
                let file = self.year_pattern.replace("{year}", &year.to_string());
                Some(self.data_dir.join(file))
            }
            DatasetLabel::Cumulative => Some(self.data_dir.join(&self.cumulative_file)),
            DatasetLabel::Uploaded => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    /// Base map styles offered to the frontend.
    pub styles: Vec<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 37.5,
            center_lon: -119.0,
            zoom: 5.0,
            styles: vec![
                "carto-positron".to_string(),
                "open-street-map".to_string(),
                "stamen-terrain".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub assets_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendConfig {
    /// Where the generated trend chart PNG is written.
    pub output: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Every selectable dataset, in sidebar order.
    pub fn dataset_labels(&self) -> Vec<DatasetLabel> {
        let mut labels: Vec<DatasetLabel> = self
            .input
            .years
            .iter()
            .copied()
            .map(DatasetLabel::Year)
            .collect();
        labels.push(DatasetLabel::Cumulative);
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [input]
        data_dir = "data"
        years = [2016, 2017, 2018, 2019, 2020]
        year_pattern = "burned_{year}_vector.geojson"
        cumulative_file = "burned_cumulative_vector.geojson"

        [server]
        port = 8080
        assets_dir = "static"

        [trend]
        output = "static/trend.png"
    "#;

    #[test]
    fn parses_and_resolves_dataset_paths() {
        let config: AppConfig = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(
            config.input.dataset_path(&DatasetLabel::Year(2016)),
            Some(PathBuf::from("data/burned_2016_vector.geojson"))
        );
        assert_eq!(
            config.input.dataset_path(&DatasetLabel::Cumulative),
            Some(PathBuf::from("data/burned_cumulative_vector.geojson"))
        );
    }

    #[test]
    fn unconfigured_selections_have_no_path() {
        let config: AppConfig = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.input.dataset_path(&DatasetLabel::Year(1999)), None);
        assert_eq!(config.input.dataset_path(&DatasetLabel::Uploaded), None);
    }

    #[test]
    fn map_section_falls_back_to_california_defaults() {
        let config: AppConfig = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.map.center_lon, -119.0);
        assert_eq!(config.map.styles.len(), 3);
    }

    #[test]
    fn dataset_labels_end_with_cumulative() {
        let config: AppConfig = toml::from_str(EXAMPLE).unwrap();
        let labels = config.dataset_labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels.last(), Some(&DatasetLabel::Cumulative));
    }
}

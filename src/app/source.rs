use std::{fs, path::PathBuf};

use crate::{
    api::client::EventApiClient,
    feature::{error::LoadError, feature::RawCollection, geojson::parse_feature_collection},
};

use super::config::Config;

/// Where the feature collection comes from.
pub enum FeatureSource {
    Api(EventApiClient),
    File(PathBuf),
}

impl FeatureSource {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match (&config.api_base_url, &config.data_filepath) {
            (Some(base_url), _) => Ok(FeatureSource::Api(EventApiClient::new(base_url)?)),
            (None, Some(filepath)) => Ok(FeatureSource::File(filepath.clone())),
            (None, None) => Err(anyhow::anyhow!("No feature source configured")),
        }
    }

    pub fn fetch(&self) -> Result<RawCollection, LoadError> {
        match self {
            FeatureSource::Api(client) => client.fetch_events(),
            FeatureSource::File(filepath) => {
                log::info!("Reading features from {:?}", filepath);
                let body = fs::read_to_string(filepath)
                    .map_err(|err| LoadError::Fetch(format!("{:?}: {}", filepath, err)))?;
                parse_feature_collection(&body)
            }
        }
    }

    pub fn api(&self) -> Option<&EventApiClient> {
        match self {
            FeatureSource::Api(client) => Some(client),
            FeatureSource::File(_) => None,
        }
    }
}

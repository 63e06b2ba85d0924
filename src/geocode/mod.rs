//! Place-name and IP based location lookups. A miss or a failed lookup is never an error to the
//! user: location-dependent queries fall back to the unfiltered feature set.
use std::time::Duration;

use anyhow::Context;
use reqwest::{blocking::Client, Url};
use serde::Deserialize;

use crate::{
    analysis::buffer::buffer_query,
    feature::feature::{Feature, LatLng},
};

pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const IPAPI_URL: &str = "https://ipapi.co/json/";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Geocoder {
    /// Location of `place`, or `None` if nothing matched.
    fn lookup(&self, place: &str) -> anyhow::Result<Option<LatLng>>;
}

fn lookup_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .user_agent(concat!("geoboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub struct NominatimGeocoder {
    client: Client,
    search_url: Url,
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(search_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: lookup_client()?,
            search_url: Url::parse(search_url)?,
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup(&self, place: &str) -> anyhow::Result<Option<LatLng>> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", place)
            .append_pair("format", "json")
            .append_pair("limit", "1");
        let places: Vec<NominatimPlace> = self.client.get(url).send()?.error_for_status()?.json()?;
        match places.first() {
            Some(found) => Ok(Some(LatLng::new(found.lat.parse()?, found.lon.parse()?))),
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
struct IpLocation {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Approximate location of this machine from its public IP address.
pub struct IpLocator {
    client: Client,
    url: Url,
}

impl IpLocator {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: lookup_client()?,
            url: Url::parse(url)?,
        })
    }

    pub fn locate(&self) -> anyhow::Result<Option<LatLng>> {
        let location: IpLocation = self
            .client
            .get(self.url.clone())
            .send()?
            .error_for_status()?
            .json()?;
        Ok(location_from_response(location))
    }
}

fn location_from_response(location: IpLocation) -> Option<LatLng> {
    if location.error {
        log::warn!(
            "IP location lookup failed: {}",
            location.reason.as_deref().unwrap_or("unknown reason")
        );
        return None;
    }
    match (location.latitude, location.longitude) {
        (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
        _ => None,
    }
}

/// Features within `radius_km` of a named place. When the place cannot be resolved the query is not
/// geofenced and every feature is returned.
pub fn features_near_place<'a>(
    features: &'a [Feature],
    geocoder: &dyn Geocoder,
    place: &str,
    radius_km: f64,
) -> Vec<&'a Feature> {
    match geocoder.lookup(place) {
        Ok(Some(location)) => buffer_query(features, location.to_point(), radius_km).matches,
        Ok(None) => {
            log::info!("No location found for '{}', not filtering by place", place);
            features.iter().collect()
        }
        Err(err) => {
            log::warn!("Geocoding '{}' failed: {:?}", place, err);
            features.iter().collect()
        }
    }
}

//! Nominatim geocoding client.

use serde::Deserialize;

use crate::error::ServiceError;
use crate::traits::{GeocodeMatch, GeocodingService};
use crate::zone::Coordinate;

#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying user agent.
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("trip-augmenter/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        )
    }
}

fn parse_first(query: &str, results: Vec<NominatimResult>) -> Result<GeocodeMatch, ServiceError> {
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::NoResults(query.to_string()))?;

    let lat: f64 = first
        .lat
        .parse()
        .map_err(|_| ServiceError::Parse(format!("invalid latitude {:?}", first.lat)))?;
    let lon: f64 = first
        .lon
        .parse()
        .map_err(|_| ServiceError::Parse(format!("invalid longitude {:?}", first.lon)))?;

    Ok(GeocodeMatch {
        coordinate: Coordinate::new(lat, lon),
        address: first.display_name,
    })
}

impl GeocodingService for NominatimClient {
    fn geocode(&self, query: &str) -> Result<GeocodeMatch, ServiceError> {
        let url = self.search_url(query);
        tracing::debug!("[NOMINATIM] geocode \"{}\"", query);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let results: Vec<NominatimResult> = serde_json::from_str(&response.text()?)?;
        parse_first(query, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encodes_query() {
        let client = NominatimClient::new(NominatimConfig::default()).unwrap();
        let url = client.search_url("Times Sq/Theatre District, Manhattan");
        assert_eq!(
            url,
            "https://nominatim.openstreetmap.org/search?q=Times%20Sq%2FTheatre%20District%2C%20Manhattan&format=json&limit=1"
        );
    }

    #[test]
    fn test_parse_first_result() {
        let body = r#"[{"lat":"40.7579","lon":"-73.9855","display_name":"Times Square, Manhattan, New York"}]"#;
        let results: Vec<NominatimResult> = serde_json::from_str(body).unwrap();
        let found = parse_first("Times Square", results).unwrap();
        assert_eq!(found.coordinate, Coordinate::new(40.7579, -73.9855));
        assert_eq!(found.address, "Times Square, Manhattan, New York");
    }

    #[test]
    fn test_parse_empty_is_no_results() {
        let err = parse_first("Nowhere", Vec::new()).unwrap_err();
        assert!(matches!(err, ServiceError::NoResults(q) if q == "Nowhere"));
    }

    #[test]
    fn test_parse_bad_latitude() {
        let results = vec![NominatimResult {
            lat: "north".to_string(),
            lon: "-73.9".to_string(),
            display_name: String::new(),
        }];
        assert!(matches!(parse_first("x", results), Err(ServiceError::Parse(_))));
    }

    #[test]
    #[ignore] // hits the public Nominatim API
    fn test_live_geocode_jfk() {
        let client = NominatimClient::new(NominatimConfig::default()).unwrap();
        let found = client.geocode("JFK Airport, Queens, New York City, NY, USA").unwrap();
        assert!((found.coordinate.lat - 40.64).abs() < 0.1);
        assert!((found.coordinate.lon + 73.78).abs() < 0.1);
    }
}

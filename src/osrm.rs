//! OSRM HTTP adapter for point-to-point routes.

use serde::Deserialize;

use crate::error::ServiceError;
use crate::traits::{RouteLeg, RouteService};
use crate::zone::Coordinate;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=false",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }
}

impl RouteService for OsrmClient {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg, ServiceError> {
        let url = self.route_url(origin, destination);
        tracing::debug!("[OSRM] GET {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        let text = response.text()?;

        // OSRM reports NoRoute/NoSegment with a 400 and a JSON body.
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: OsrmRouteResponse = serde_json::from_str(&text)?;
        if body.code != "Ok" {
            return Err(ServiceError::Unavailable(format!(
                "OSRM returned {}: {}",
                body.code,
                body.message.unwrap_or_default()
            )));
        }

        let route = body
            .routes
            .first()
            .ok_or_else(|| ServiceError::NoResults(url.clone()))?;

        Ok(RouteLeg {
            distance_km: route.distance / 1000.0,
            duration_min: route.duration / 60.0,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_url_is_lon_lat() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://osrm.local/".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();
        let url = client.route_url(
            Coordinate::new(40.7589, -73.9851),
            Coordinate::new(40.6413, -73.7781),
        );
        assert_eq!(
            url,
            "http://osrm.local/route/v1/car/-73.985100,40.758900;-73.778100,40.641300?overview=false"
        );
    }

    #[test]
    fn test_parse_route_response() {
        let body = r#"{"code":"Ok","routes":[{"distance":26550.3,"duration":2190.0,"legs":[]}],"waypoints":[]}"#;
        let parsed: OsrmRouteResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.code, "Ok");
        assert_eq!(parsed.routes[0].distance, 26550.3);
    }

    #[test]
    fn test_parse_no_route_response() {
        let body = r#"{"code":"NoRoute","message":"Impossible route between points"}"#;
        let parsed: OsrmRouteResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.routes.is_empty());
        assert_eq!(parsed.message.as_deref(), Some("Impossible route between points"));
    }

    #[test]
    #[ignore] // needs a running osrm-routed with New York data on OSRM_URL
    fn test_live_route_midtown_to_jfk() {
        let base_url = std::env::var("OSRM_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
        let client = OsrmClient::new(OsrmConfig {
            base_url,
            ..OsrmConfig::default()
        })
        .unwrap();
        let leg = client
            .route(Coordinate::new(40.7589, -73.9851), Coordinate::new(40.6413, -73.7781))
            .unwrap();
        assert!(leg.distance_km > 20.0 && leg.distance_km < 40.0, "got {}", leg.distance_km);
    }
}

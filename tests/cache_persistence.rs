//! Cache save/load across engine instances.

mod fixtures;

use trip_augmenter::search::SearchOptions;

use fixtures::*;

const EXPECTED_MILES: f64 = 16.5;

#[test]
fn test_reloaded_caches_serve_previous_trips_without_calls() {
    let dir = tempfile::tempdir().unwrap();

    let geocoder = ScriptedGeocoder::nyc();
    let router = ScriptedRouter::constant_miles(100.0);
    let first = engine(
        &geocoder,
        &router,
        test_config_in(SearchOptions::default(), dir.path()),
    );
    let original = first.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();
    assert_eq!(router.calls(), 9);
    first.save_caches().unwrap();

    let fresh_geocoder = ScriptedGeocoder::nyc();
    let fresh_router = ScriptedRouter::constant_miles(100.0);
    let second = engine(
        &fresh_geocoder,
        &fresh_router,
        test_config_in(SearchOptions::default(), dir.path()),
    );
    second.load_caches().unwrap();
    let replayed = second.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();

    assert_eq!(fresh_geocoder.calls(), 0);
    assert_eq!(fresh_router.calls(), 0);
    let stats = second.snapshot();
    assert_eq!(stats.api_calls, 0);
    assert_eq!(stats.cache_hits, 2 + 9);
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(original.pickup_location, replayed.pickup_location);
    assert_eq!(original.dropoff_location, replayed.dropoff_location);
    assert_eq!(original.estimated_distance_km, replayed.estimated_distance_km);
}

#[test]
fn test_load_without_files_is_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let geocoder = ScriptedGeocoder::nyc();
    let router = ScriptedRouter::constant_miles(16.5);
    let engine = engine(
        &geocoder,
        &router,
        test_config_in(SearchOptions::default(), dir.path()),
    );

    engine.load_caches().unwrap();
    assert_eq!(engine.manager().store().geocode_len(), 0);
    assert_eq!(engine.manager().store().route_len(), 0);
}

#[test]
fn test_saved_files_follow_documented_schema() {
    let dir = tempfile::tempdir().unwrap();
    let geocoder = ScriptedGeocoder::nyc();
    let router = ScriptedRouter::constant_miles(16.5);
    let engine = engine(
        &geocoder,
        &router,
        test_config_in(SearchOptions::simple(0.3), dir.path()),
    );
    engine.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();
    engine.save_caches().unwrap();

    let geocodes: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("geocode_cache.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(geocodes["230"]["lat"], 40.7589);
    assert_eq!(geocodes["132"]["lon"], -73.7781);
    assert!(geocodes["132"]["address"].as_str().unwrap().starts_with("JFK Airport"));

    let routes: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("route_cache.json")).unwrap(),
    )
    .unwrap();
    let entry = &routes["40.75890,-73.98510|40.64130,-73.77810"];
    assert!(entry["distance_km"].as_f64().unwrap() > 26.0);
    assert!(entry["duration_min"].is_number());
}

#[test]
fn test_loading_keeps_fresher_in_memory_entries() {
    let dir = tempfile::tempdir().unwrap();

    // Persist a route cache where Times Sq -> JFK is 100 miles.
    let geocoder = ScriptedGeocoder::nyc();
    let stale_router = ScriptedRouter::constant_miles(100.0);
    let stale = engine(
        &geocoder,
        &stale_router,
        test_config_in(SearchOptions::simple(0.3), dir.path()),
    );
    stale.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();
    stale.save_caches().unwrap();

    // A new run computes 16.5 miles first, then loads the old dump.
    let fresh_router = ScriptedRouter::constant_miles(16.5);
    let fresh = engine(
        &geocoder,
        &fresh_router,
        test_config_in(SearchOptions::simple(0.3), dir.path()),
    );
    fresh.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();
    fresh.load_caches().unwrap();

    let again = fresh.augment(TIMES_SQUARE_ID, JFK_ID, EXPECTED_MILES).unwrap();
    assert!((again.estimated_distance_miles.unwrap() - 16.5).abs() < 1e-9);
    assert_eq!(fresh_router.calls(), 1);
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use haystack_cache::station::{self, ComponentTree};
use haystack_cache::{Cache, CacheConfig, Collaborators};
use haystack_types::NavId;
use nhaystack::{report, rebuild_with_timeout};

fn demo_station() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/station.toml")
}

#[tokio::test]
async fn test_demo_station() {
    let station = Arc::new(station::load_toml_file(demo_station()).unwrap());
    let cache = Arc::new(Cache::new(
        CacheConfig::default(),
        Collaborators::for_snapshot(station.clone()),
    ));
    rebuild_with_timeout(cache.clone(), Duration::from_secs(5))
        .await
        .unwrap();

    let sites = report::components(station.as_ref(), &cache.all_sites().unwrap());
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].path, "/Sites/Plant1");

    let ahu = NavId::equip("Plant1", "AHU1");
    let sat = cache.nav_point(&ahu, "Supply Air Temp").unwrap().unwrap();
    assert_eq!(station.component(sat).unwrap().slot_path, "/Sites/Plant1/AHU1/SAT");

    let znt = station.resolve_slot("/Sites/Plant1/AHU1/VAV1/ZNT").unwrap();
    let vav = station.resolve_slot("/Sites/Plant1/AHU1/VAV1").unwrap();
    assert_eq!(cache.implicit_equip(znt).unwrap(), Some(vav));
    assert_eq!(cache.all_equips().unwrap().len(), 2);

    assert_eq!(cache.nav_history_station_names().unwrap(), vec!["Remote1".to_string()]);
    let remote1 = cache.nav_histories("Remote1").unwrap();
    let rows = report::histories(remote1.iter().map(|c| &**c), None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "/Remote1/AHU1_RAT");
}

#[test]
fn test_demo_settings() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/nhaystack.toml");
    let settings = nhaystack::Settings::load(&path).unwrap();
    assert_eq!(settings.snapshot, PathBuf::from("demos/station.toml"));
    assert_eq!(settings.cache.root, "slot:/");
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use haystack_cache::station::{
    HistoryConfig, HistoryDatabase, ProxyExt, StationError, StationSnapshot,
};
use haystack_cache::visibility::AllVisible;
use haystack_cache::{Cache, CacheConfig, CacheError, Collaborators};
use haystack_types::{Handle, HistoryId, NavId, Ref, RemotePoint, Tags};

const NIAGARA_PROXY: &str = "niagaraDriver:NiagaraProxyExt";

fn proxy(station: &str, point_id: &str) -> Option<ProxyExt> {
    Some(ProxyExt {
        kind: NIAGARA_PROXY.to_string(),
        station_name: station.to_string(),
        point_id: point_id.to_string(),
    })
}

fn site_ref(handle: Handle) -> Tags {
    Tags::builder().add("siteRef", Ref::from_handle(handle)).build()
}

fn equip_ref(handle: Handle) -> Tags {
    Tags::builder().add("equipRef", Ref::from_handle(handle)).build()
}

fn cache_for(station: &Arc<StationSnapshot>) -> Cache {
    Cache::new(CacheConfig::default(), Collaborators::for_snapshot(station.clone()))
}

struct Plant {
    station: Arc<StationSnapshot>,
    site: Handle,
    ahu: Handle,
    sat: Handle,
}

/// /Sites/Plant1 (site), /Sites/Plant1/AHU1 (equip, siteRef Plant1),
/// /Sites/Plant1/AHU1/SAT (point, equipRef AHU1, proxied from Remote1)
fn plant() -> Plant {
    let station = Arc::new(StationSnapshot::new("Local"));
    let sites = station.add_folder(station.root(), "Sites").unwrap();
    let site = station.add_site(sites, "Plant1", Tags::default()).unwrap();
    let ahu = station.add_equip(site, "AHU1", site_ref(site)).unwrap();
    let sat = station
        .add_point(ahu, "SAT", equip_ref(ahu), proxy("Remote1", "/Drivers/SAT"))
        .unwrap();
    Plant {
        station,
        site,
        ahu,
        sat,
    }
}

#[test]
fn test_plant_navigation() {
    let p = plant();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.all_sites().unwrap(), vec![p.site]);
    assert_eq!(cache.all_equips().unwrap(), vec![p.ahu]);
    assert_eq!(cache.nav_site(&NavId::site("Plant1")).unwrap(), Some(p.site));
    assert_eq!(
        cache.nav_site_equips(&NavId::site("Plant1")).unwrap(),
        vec![p.ahu]
    );

    let ahu_nav: NavId = "sep:/Plant1/AHU1".parse().unwrap();
    assert_eq!(cache.nav_equip(&ahu_nav).unwrap(), Some(p.ahu));
    assert_eq!(cache.nav_equip_points(&ahu_nav).unwrap(), vec![p.sat]);
    assert_eq!(cache.nav_point(&ahu_nav, "SAT").unwrap(), Some(p.sat));
    assert_eq!(cache.nav_point(&ahu_nav, "RAT").unwrap(), None);

    assert_eq!(
        cache
            .control_point(&RemotePoint::new("Remote1", "/Drivers/SAT"))
            .unwrap(),
        Some(p.sat)
    );
    assert_eq!(cache.implicit_equip(p.sat).unwrap(), None);
}

#[test]
fn test_nav_point_uses_nav_name_format() {
    let p = plant();
    p.station
        .set_tags(
            p.sat,
            Some(
                equip_ref(p.ahu)
                    .with("point", haystack_types::TagValue::Marker)
                    .with("navNameFormat", "%parent.name%_%name%"),
            ),
        )
        .unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    let nav = NavId::equip("Plant1", "AHU1");
    assert_eq!(cache.nav_point(&nav, "AHU1_SAT").unwrap(), Some(p.sat));
    assert_eq!(cache.nav_point(&nav, "SAT").unwrap(), None);
}

#[test]
fn test_explicit_equip_ref_wins_over_ancestor() {
    let p = plant();
    let ahu2 = p.station.add_equip(p.site, "AHU2", site_ref(p.site)).unwrap();
    // lives under AHU1 but names AHU2
    let rat = p
        .station
        .add_point(p.ahu, "RAT", equip_ref(ahu2), None)
        .unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.implicit_equip(rat).unwrap(), None);
    assert_eq!(
        cache.nav_equip_points(&NavId::equip("Plant1", "AHU2")).unwrap(),
        vec![rat]
    );
    assert_eq!(
        cache.nav_equip_points(&NavId::equip("Plant1", "AHU1")).unwrap(),
        vec![p.sat]
    );
}

#[test]
fn test_implicit_equip_is_nearest_ancestor() {
    let p = plant();
    let vav = p.station.add_equip(p.ahu, "VAV1", Tags::default()).unwrap();
    let sub = p.station.add_folder(vav, "Points").unwrap();
    let znt = p.station.add_point(sub, "ZNT", Tags::default(), None).unwrap();
    let da = p.station.add_point(p.ahu, "DAT", Tags::default(), None).unwrap();
    let loose = p.station.add_point(p.site, "OAT", Tags::default(), None).unwrap();

    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.implicit_equip(znt).unwrap(), Some(vav));
    assert_eq!(cache.implicit_equip(da).unwrap(), Some(p.ahu));
    assert_eq!(cache.implicit_equip(loose).unwrap(), None);
    assert_eq!(
        cache.nav_equip_points(&NavId::equip("Plant1", "AHU1")).unwrap(),
        vec![p.sat, da]
    );
}

#[test]
fn test_unresolved_equip_ref_leaves_point_unowned() {
    let p = plant();
    let orphan = p
        .station
        .add_point(
            p.ahu,
            "ORPHAN",
            Tags::builder().add("equipRef", Ref::new("@slot:/Nowhere")).build(),
            None,
        )
        .unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.implicit_equip(orphan).unwrap(), None);
    assert_eq!(
        cache.nav_equip_points(&NavId::equip("Plant1", "AHU1")).unwrap(),
        vec![p.sat]
    );
}

#[test]
fn test_mistyped_equip_ref_blocks_implicit_equip() {
    let p = plant();
    // a plain string, not a ref
    let stray = p
        .station
        .add_point(
            p.ahu,
            "STRAY",
            Tags::builder().add("equipRef", "slot:/Elsewhere").build(),
            None,
        )
        .unwrap();
    let odd_equip = p
        .station
        .add_equip(
            p.site,
            "AHU7",
            Tags::builder().add("siteRef", "slot:/Sites/Plant1").build(),
        )
        .unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.implicit_equip(stray).unwrap(), None);
    assert_eq!(
        cache.nav_equip_points(&NavId::equip("Plant1", "AHU1")).unwrap(),
        vec![p.sat]
    );
    assert!(cache.all_equips().unwrap().contains(&odd_equip));
    assert_eq!(cache.nav_equip(&NavId::equip("Plant1", "AHU7")).unwrap(), None);
}

#[test]
fn test_unresolvable_site_ref_is_not_navigable() {
    let p = plant();
    let lost = p
        .station
        .add_equip(
            p.site,
            "AHU9",
            Tags::builder().add("siteRef", Ref::new("@slot:/Gone")).build(),
        )
        .unwrap();
    let unlinked = p.station.add_equip(p.site, "AHU8", Tags::default()).unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(cache.all_equips().unwrap(), vec![p.ahu, lost, unlinked]);
    assert_eq!(cache.nav_equip(&NavId::equip("Plant1", "AHU9")).unwrap(), None);
    assert_eq!(cache.nav_equip(&NavId::equip("Plant1", "AHU8")).unwrap(), None);
    assert_eq!(
        cache.nav_site_equips(&NavId::site("Plant1")).unwrap(),
        vec![p.ahu]
    );
}

#[test]
fn test_history_correlation_and_visibility() {
    let p = plant();
    let st = &p.station;
    st.add_history(HistoryConfig::new(HistoryId::new("Local", "SAT")).with_source("/Sites/Plant1/AHU1/SAT"));
    let proxied = st.add_history(
        HistoryConfig::new(HistoryId::new("Remote1", "SAT")).with_source("/Drivers/SAT"),
    );
    let rat = st.add_history(
        HistoryConfig::new(HistoryId::new("Remote1", "RAT")).with_source("/Drivers/RAT"),
    );
    st.add_history(
        HistoryConfig::new(HistoryId::new("Remote2", "OAT"))
            .with_tags(Tags::builder().marker("hidden").build()),
    );
    let power = st.add_history(HistoryConfig::new(HistoryId::new("Remote3", "kW")));

    let cache = cache_for(st);
    cache.rebuild().unwrap();

    assert_eq!(
        cache
            .history_config(&RemotePoint::new("Remote1", "/Drivers/SAT"))
            .unwrap(),
        Some(proxied)
    );
    assert_eq!(
        cache
            .history_config(&RemotePoint::new("Local", "/Sites/Plant1/AHU1/SAT"))
            .unwrap(),
        None
    );

    assert_eq!(
        cache.nav_history_station_names().unwrap(),
        vec!["Remote1".to_string(), "Remote3".to_string()]
    );
    assert_eq!(cache.nav_histories("Remote1").unwrap(), vec![rat]);
    assert_eq!(cache.nav_histories("Remote3").unwrap(), vec![power]);
    assert_eq!(
        cache.nav_histories("Local").unwrap_err(),
        CacheError::NoNavHistories("Local".to_string())
    );
    assert_eq!(
        cache.nav_histories("unknown-station").unwrap_err(),
        CacheError::NoNavHistories("unknown-station".to_string())
    );
}

#[test]
fn test_all_visible_policy_lists_proxied_histories() {
    let p = plant();
    p.station.add_history(
        HistoryConfig::new(HistoryId::new("Remote1", "SAT")).with_source("/Drivers/SAT"),
    );
    p.station.add_history(HistoryConfig::new(HistoryId::new("Local", "x")));
    let collab = Collaborators::for_snapshot(p.station.clone()).with_visibility(Arc::new(AllVisible));
    let cache = Cache::new(CacheConfig::default(), collab);
    cache.rebuild().unwrap();

    assert_eq!(cache.nav_histories("Remote1").unwrap().len(), 1);
    assert!(cache.nav_histories("Local").is_err());
}

#[test]
fn test_proxy_kind_must_match() {
    let p = plant();
    let other = p
        .station
        .add_point(
            p.ahu,
            "BACNET",
            Tags::default(),
            Some(ProxyExt {
                kind: "bacnet:BacnetPointDeviceExt".to_string(),
                station_name: "Remote1".to_string(),
                point_id: "/Drivers/BAC".to_string(),
            }),
        )
        .unwrap();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    assert_eq!(
        cache
            .control_point(&RemotePoint::new("Remote1", "/Drivers/BAC"))
            .unwrap(),
        None
    );
    assert_eq!(cache.implicit_equip(other).unwrap(), Some(p.ahu));
}

#[test]
fn test_counters_count_tags_independently() {
    let p = plant();
    // a point that is also tagged equip counts toward both
    p.station
        .add_point(
            p.ahu,
            "ODD",
            Tags::builder().marker("equip").build(),
            None,
        )
        .unwrap();
    p.station.add_history(
        HistoryConfig::new(HistoryId::new("Remote1", "SAT"))
            .with_tags(Tags::builder().marker("point").build()),
    );
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.num_sites, 1);
    assert_eq!(stats.num_equips, 2);
    assert_eq!(stats.num_points, 3);
    // classification only counts tagged equips
    assert_eq!(stats.equips, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["num_points"], 3);
}

#[test]
fn test_rebuild_is_idempotent() {
    let p = plant();
    p.station.add_history(HistoryConfig::new(HistoryId::new("Remote1", "RAT")).with_source("/Drivers/RAT"));
    let cache = cache_for(&p.station);

    let first = cache.rebuild().unwrap();
    let second = cache.rebuild().unwrap();
    assert_eq!(first.indexes(), second.indexes());
    assert!(second.rebuilt_at() >= first.rebuilt_at());
}

#[test]
fn test_removed_components_disappear_on_rebuild() {
    let p = plant();
    let cache = cache_for(&p.station);
    cache.rebuild().unwrap();

    p.station.remove(p.ahu).unwrap();
    let nav = NavId::equip("Plant1", "AHU1");

    // stale tables until the next rebuild, destroyed points are skipped
    assert_eq!(cache.nav_equip_points(&nav).unwrap(), vec![p.sat]);
    assert_eq!(cache.nav_point(&nav, "SAT").unwrap(), None);

    cache.rebuild().unwrap();
    assert!(cache.all_equips().unwrap().is_empty());
    assert_eq!(cache.nav_equip(&nav).unwrap(), None);
    assert!(cache.nav_equip_points(&nav).unwrap().is_empty());
}

#[test]
fn test_missing_root_fails_before_first_generation() {
    let p = plant();
    let cache = Cache::new(
        CacheConfig::default().with_root("slot:/Missing"),
        Collaborators::for_snapshot(p.station.clone()),
    );
    assert_eq!(
        cache.rebuild().unwrap_err(),
        CacheError::Rebuild(StationError::RootNotFound("slot:/Missing".to_string()))
    );
    assert!(!cache.is_initialized());
    assert_eq!(cache.all_sites(), Err(CacheError::Uninitialized));
}

/// History database that can be switched into a failing state
struct FlakyHistories {
    inner: Arc<StationSnapshot>,
    failing: AtomicBool,
}

impl HistoryDatabase for FlakyHistories {
    fn histories(&self) -> Result<Vec<Arc<HistoryConfig>>, StationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StationError::HistoryDb("database offline".to_string()));
        }
        self.inner.histories()
    }
}

#[test]
fn test_failed_rebuild_keeps_previous_generation() {
    let p = plant();
    p.station.add_history(HistoryConfig::new(HistoryId::new("Remote1", "RAT")).with_source("/Drivers/RAT"));
    let flaky = Arc::new(FlakyHistories {
        inner: p.station.clone(),
        failing: AtomicBool::new(false),
    });
    let collab = Collaborators::for_snapshot(p.station.clone()).with_histories(flaky.clone());
    let cache = Cache::new(CacheConfig::default(), collab);

    let good = cache.rebuild().unwrap();

    // the component pass would see this site, but the history pass fails
    p.station.add_site(p.station.root(), "Plant2", Tags::default()).unwrap();
    flaky.failing.store(true, Ordering::SeqCst);

    let err = cache.rebuild().unwrap_err();
    assert!(matches!(err, CacheError::Rebuild(StationError::HistoryDb(_))));

    let current = cache.generation().unwrap();
    assert!(Arc::ptr_eq(&good, &current));
    assert_eq!(cache.all_sites().unwrap(), vec![p.site]);
    assert_eq!(cache.nav_site(&NavId::site("Plant2")).unwrap(), None);
    assert_eq!(cache.nav_history_station_names().unwrap(), vec!["Remote1".to_string()]);

    flaky.failing.store(false, Ordering::SeqCst);
    cache.rebuild().unwrap();
    assert_eq!(cache.all_sites().unwrap().len(), 2);
}

#[test]
fn test_concurrent_readers_during_rebuilds() {
    let p = plant();
    let cache = Arc::new(cache_for(&p.station));
    cache.rebuild().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let site = p.site;
            thread::spawn(move || {
                for _ in 0..200 {
                    let generation = cache.generation().unwrap();
                    let idx = generation.indexes();
                    assert_eq!(idx.counts().sites, 1);
                    assert_eq!(cache.nav_site(&NavId::site("Plant1")).unwrap(), Some(site));
                }
            })
        })
        .collect();

    for _ in 0..20 {
        cache.rebuild().unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_load_snapshot_document() {
    let doc = r#"
        [station]
        name = "Local"

        [[component]]
        path = "/Sites/Plant1"
        kind = "site"

        [[component]]
        path = "/Sites/Plant1/AHU1"
        kind = "equip"
        tags = { siteRef = "@slot:/Sites/Plant1" }

        [[component]]
        path = "/Sites/Plant1/AHU1/SAT"
        kind = "point"
        tags = { equipRef = "@slot:/Sites/Plant1/AHU1", sensor = true }
        proxy = { kind = "niagaraDriver:NiagaraProxyExt", station_name = "Remote1", point_id = "/Drivers/SAT" }

        [[history]]
        device = "Remote1"
        name = "RAT"
        source = "/Drivers/RAT"
    "#;
    let station = Arc::new(haystack_cache::station::load_toml(doc).unwrap());
    let cache = cache_for(&station);
    cache.rebuild().unwrap();

    let nav = NavId::equip("Plant1", "AHU1");
    assert_eq!(cache.nav_equip_points(&nav).unwrap().len(), 1);
    assert!(cache.nav_point(&nav, "SAT").unwrap().is_some());
    assert_eq!(cache.nav_histories("Remote1").unwrap().len(), 1);
}

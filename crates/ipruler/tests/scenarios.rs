//! End-to-end reconcile cycles against the in-memory kernel.

use ipruler::kernel::{Call, MemoryKernel, Op};
use ipruler::netlink::types::route::{rt_scope, rtn, rtprot};
use ipruler::{Engine, Error, Kernel, RouteSpec, RuleSpec};

fn rule(source: &str, table: u32) -> RuleSpec {
    RuleSpec {
        source: source.parse().unwrap(),
        table,
    }
}

fn host() -> MemoryKernel {
    MemoryKernel::new()
        .with_link(1, "lo")
        .with_link(2, "eth0")
        .with_address(2, "172.31.201.10/24")
}

const TWO_RULES: &str = "
rules:
  - from: 172.31.201.11/32
    table: 101
  - from: 172.31.201.12/32
    table: 102
";

const ONE_RULE: &str = "
rules:
  - from: 172.31.201.11/32
    table: 101
";

#[tokio::test]
async fn scenario_a_adds_rules_then_idles() {
    let engine = Engine::new(host());

    let report = engine.apply(TWO_RULES).await.unwrap();
    assert_eq!(report.rules.added, 2);
    assert_eq!(
        engine.kernel().calls(),
        vec![
            Call::AddRule(rule("172.31.201.11/32", 101)),
            Call::AddRule(rule("172.31.201.12/32", 102)),
        ]
    );

    engine.kernel().clear_calls();
    let report = engine.apply(TWO_RULES).await.unwrap();
    assert_eq!(report.changes(), 0);
    assert!(engine.kernel().calls().is_empty());
}

#[tokio::test]
async fn scenario_b_removed_rule_is_deleted() {
    let engine = Engine::new(host());
    engine.apply(TWO_RULES).await.unwrap();
    engine.kernel().clear_calls();

    let report = engine.apply(ONE_RULE).await.unwrap();
    assert_eq!(report.rules.deleted, 1);
    assert_eq!(
        engine.kernel().calls(),
        vec![Call::DelRule(rule("172.31.201.12/32", 102))]
    );
    assert_eq!(
        engine.kernel().current_rules(),
        vec![rule("172.31.201.11/32", 101)]
    );
}

#[tokio::test]
async fn scenario_c_hard_sync_purges_foreign_rule() {
    let foreign = rule("10.9.9.9/32", 101);
    let unrelated = rule("10.9.9.9/32", 200);
    let engine = Engine::new(host().with_rule(foreign).with_rule(unrelated));

    engine
        .apply(
            "
settings:
  table-hard-sync: [101]
rules:
  - from: 172.31.201.11/32
    table: 101
",
        )
        .await
        .unwrap();

    let live = engine.kernel().current_rules();
    assert!(!live.contains(&foreign));
    assert!(live.contains(&unrelated));
    assert!(live.contains(&rule("172.31.201.11/32", 101)));
}

#[tokio::test]
async fn scenario_d_default_route_finds_link_by_gateway() {
    let engine = Engine::new(host());
    engine
        .apply(
            "
routes:
  - to: default
    via: 172.31.201.1
    table: 102
",
        )
        .await
        .unwrap();

    let routes = engine.kernel().current_routes();
    assert_eq!(routes.len(), 1);
    assert!(routes[0].is_default());
    assert_eq!(routes[0].oif, 2);
    assert_eq!(routes[0].table, 102);
    assert_eq!(routes[0].gateway, Some("172.31.201.1".parse().unwrap()));
}

#[tokio::test]
async fn single_removal_under_hard_sync_deletes_once() {
    let doc = "
settings:
  table-hard-sync: [102]
rules:
  - from: 172.31.201.11/32
    table: 101
  - from: 172.31.201.12/32
    table: 102
";
    let engine = Engine::new(host());
    engine.apply(doc).await.unwrap();
    engine.kernel().clear_calls();

    // Dropped rule sits in a hard-synced table: phase A removes it and
    // phase B must not try again.
    let report = engine
        .apply(
            "
settings:
  table-hard-sync: [102]
rules:
  - from: 172.31.201.11/32
    table: 101
",
        )
        .await
        .unwrap();
    assert_eq!(report.rules.deleted, 1);
    assert_eq!(report.rules.already_absent, 0);
    assert_eq!(
        engine.kernel().calls(),
        vec![Call::DelRule(rule("172.31.201.12/32", 102))]
    );
}

#[tokio::test]
async fn removal_of_something_already_gone() {
    let engine = Engine::new(host());
    engine.apply(TWO_RULES).await.unwrap();

    // Someone else removes the rule out of band.
    engine
        .kernel()
        .del_rule(&rule("172.31.201.12/32", 102))
        .await
        .unwrap();
    let report = engine.apply(ONE_RULE).await.unwrap();
    assert_eq!(report.rules.deleted, 0);
    assert_eq!(report.rules.already_absent, 1);
}

#[tokio::test]
async fn empty_document_is_rejected_and_changes_nothing() {
    let engine = Engine::new(host());
    engine.apply(TWO_RULES).await.unwrap();
    let before = engine.current().await;
    engine.kernel().clear_calls();

    for doc in ["", "# nothing here\n", "rules: []\n", "~\n"] {
        let err = engine.apply(doc).await.unwrap_err();
        assert!(matches!(err, Error::EmptyDocument), "{:?}", doc);
        assert!(err.is_rejection());
    }
    assert_eq!(engine.current().await, before);
    assert!(engine.kernel().calls().is_empty());
}

#[tokio::test]
async fn malformed_cidr_leaves_state_untouched() {
    let engine = Engine::new(host());
    engine.apply(ONE_RULE).await.unwrap();
    let before = engine.current().await;
    engine.kernel().clear_calls();

    let err = engine
        .apply("rules:\n  - from: 172.31.201.300/32\n    table: 101\n")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvableAddress(_)));
    assert!(!err.is_fatal());
    assert_eq!(engine.current().await, before);
    assert!(engine.kernel().calls().is_empty());
}

#[tokio::test]
async fn malformed_yaml_is_rejected() {
    let engine = Engine::new(host());
    let err = engine.apply("rules: [from: {").await.unwrap_err();
    assert!(matches!(err, Error::MalformedDocument(_)));
    assert!(engine.current().await.is_none());
}

#[tokio::test]
async fn unknown_device_is_rejected() {
    let engine = Engine::new(host());
    let err = engine
        .apply("routes:\n  - to: 10.0.0.0/8\n    dev: eth9\n    table: 5\n")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvableDevice(_)));
}

#[tokio::test]
async fn kernel_failure_is_fatal() {
    let engine = Engine::new(host());
    engine.kernel().fail(Op::AddRule, libc::EPERM);

    let err = engine.apply(ONE_RULE).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::Kernel { .. }));
    // Nothing was accepted, so there is nothing to re-run.
    assert!(engine.reapply().await.unwrap().is_none());
}

#[tokio::test]
async fn reapply_repairs_drift() {
    let engine = Engine::new(host());
    engine.apply(ONE_RULE).await.unwrap();

    // The rule disappears behind our back.
    engine
        .kernel()
        .del_rule(&rule("172.31.201.11/32", 101))
        .await
        .unwrap();
    engine.kernel().clear_calls();

    let report = engine.reapply().await.unwrap().unwrap();
    assert_eq!(report.rules.added, 1);
    assert_eq!(
        engine.kernel().calls(),
        vec![Call::AddRule(rule("172.31.201.11/32", 101))]
    );
}

#[tokio::test]
async fn vlan_route_and_rule_together() {
    let doc = "
vlans:
  - name: eth0.100
    link: eth0
    id: 100
    protocol: 802.1ad
routes:
  - to: 10.100.0.0/16
    dev: eth0.100
    table: 100
    scope: link
rules:
  - from: 10.100.0.0/16
    table: 100
";
    let engine = Engine::new(host());

    // The route names a device that only this document creates.
    let report = engine.apply(doc).await.unwrap();
    assert_eq!(report.vlans.added, 1);
    assert_eq!(report.routes.added, 1);
    assert_eq!(report.rules.added, 1);
    assert!(engine.kernel().is_up("eth0.100"));
    assert_eq!(engine.kernel().current_vlans()[0].protocol, 0x88a8);

    let routes = engine.kernel().current_routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].oif, 3);
    assert_eq!(routes[0].scope, rt_scope::LINK);
    assert_eq!(
        engine.kernel().current_rules(),
        vec![rule("10.100.0.0/16", 100)]
    );

    engine.kernel().clear_calls();
    let report = engine.apply(doc).await.unwrap();
    assert_eq!(report.changes(), 0);
    assert!(engine.kernel().calls().is_empty());
}

fn route(destination: &str, table: u32, scope: u8) -> RouteSpec {
    RouteSpec {
        destination: destination.parse().unwrap(),
        gateway: None,
        table,
        oif: 2,
        protocol: rtprot::BOOT,
        scope,
        flags: 0,
        route_type: rtn::UNICAST,
    }
}

#[tokio::test]
async fn hard_sync_replaces_route_differing_only_in_scope() {
    let foreign = route("10.50.0.0/16", 102, rt_scope::UNIVERSE);
    let stale = route("10.60.0.0/16", 102, rt_scope::UNIVERSE);
    let wanted = route("10.60.0.0/16", 102, rt_scope::LINK);
    let elsewhere = route("10.70.0.0/16", 103, rt_scope::UNIVERSE);
    let kernel = host()
        .with_route(foreign)
        .with_route(stale)
        .with_route(elsewhere);
    let engine = Engine::new(kernel);

    let report = engine
        .apply(
            "
settings:
  table-hard-sync: [102]
routes:
  - to: 10.60.0.0/16
    dev: eth0
    table: 102
    scope: link
",
        )
        .await
        .unwrap();
    assert_eq!(report.routes.deleted, 2);
    assert_eq!(report.routes.added, 1);
    assert_eq!(
        engine.kernel().calls(),
        vec![
            Call::DelRoute(foreign),
            Call::DelRoute(stale),
            Call::AddRoute(wanted),
        ]
    );
    assert_eq!(engine.kernel().current_routes(), vec![elsewhere, wanted]);

    engine.kernel().clear_calls();
    assert_eq!(engine.reapply().await.unwrap().unwrap().changes(), 0);
    assert!(engine.kernel().calls().is_empty());
}

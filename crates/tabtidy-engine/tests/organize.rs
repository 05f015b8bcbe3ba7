//! End-to-end organizing flows against the in-memory host.

use std::sync::Arc;

use async_trait::async_trait;
use config::{AltDomainRule, ColorRule, Settings};
use tabtidy_engine::Organizer;
use tabtidy_world::{
    Error as WorldError, GroupColor, GroupDelta, GroupId, Op, OpKind, Result as WorldResult,
    TabChange, TabEvent, TabId, TabInfo, TabGroupInfo, TabOps, TestTabs, WindowId,
};

const WIN: WindowId = 1;

fn organizer(world: &Arc<TestTabs>, settings: Settings) -> Organizer {
    let ops: Arc<dyn TabOps> = world.clone();
    Organizer::new(ops, settings)
}

/// Four scrambled `*.google.com` tabs; returns their ids in ascending id
/// order (which is the order they were added: d, b, a, c).
fn seed_google(world: &TestTabs) -> Vec<TabId> {
    let mut tabs = vec![
        world.add_tab(WIN, "https://d.google.com/"),
        world.add_tab(WIN, "https://b.google.com/"),
        world.add_tab(WIN, "https://a.google.com/"),
        world.add_tab(WIN, "https://c.google.com/"),
    ];
    tabs.sort_unstable();
    tabs
}

#[tokio::test]
async fn four_subdomains_sort_and_group() {
    let world = Arc::new(TestTabs::new());
    seed_google(&world);
    let org = organizer(&world, Settings::default());

    let summary = org.organize(WIN).await.unwrap();
    assert_eq!(summary.tabs, 4);
    assert!(!summary.superseded);

    assert_eq!(
        world.urls_in_order(WIN),
        vec![
            "https://a.google.com/",
            "https://b.google.com/",
            "https://c.google.com/",
            "https://d.google.com/",
        ]
    );
    let group = world.group_by_title(WIN, "google").expect("group created");
    // Default color rules paint google groups blue.
    assert_eq!(group.color, GroupColor::Blue);
    for tab in world.tab_order(WIN) {
        assert_eq!(world.group_of(tab), group.id);
    }
}

#[tokio::test]
async fn second_run_is_an_empty_plan() {
    let world = Arc::new(TestTabs::new());
    seed_google(&world);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();
    world.clear_ops();

    let summary = org.organize(WIN).await.unwrap();
    assert_eq!(summary.moves, 0);
    assert_eq!(summary.group_ops, 0);
    assert!(world.ops().is_empty(), "converged world must produce no ops");
}

#[tokio::test]
async fn split_group_folds_into_the_titled_group() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    let seeded = world.seed_group(WIN, "google", GroupColor::Blue, &tabs[..2]);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    for tab in &tabs {
        assert_eq!(world.group_of(*tab), seeded);
    }
    // The strays joined the existing group; nothing was created.
    assert!(world.ops().iter().any(|op| matches!(op, Op::AddTo { group, .. } if *group == seeded)));
    assert!(!world.ops().iter().any(|op| matches!(op, Op::Create { .. })));
}

#[tokio::test]
async fn wrongly_titled_group_is_replaced_not_retitled() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    let old = world.seed_group(WIN, "misc", GroupColor::Grey, &tabs);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    let group = world.group_by_title(WIN, "google").expect("fresh group");
    assert_ne!(group.id, old);
    assert!(world.group_by_title(WIN, "misc").is_none(), "old group dissolved");
    // The user's own group title was never rewritten.
    assert!(!world.ops().iter().any(
        |op| matches!(op, Op::Update { group, delta } if *group == old && delta.title.is_some())
    ));
}

#[tokio::test]
async fn correctly_titled_group_only_gets_recolored() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    let seeded = world.seed_group(WIN, "google", GroupColor::Pink, &tabs);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    assert_eq!(
        world.group_by_title(WIN, "google").unwrap().color,
        GroupColor::Blue
    );
    let ops = world.ops();
    assert!(ops.iter().all(|op| !matches!(
        op,
        Op::Create { .. } | Op::AddTo { .. } | Op::Ungroup { .. }
    )));
    assert!(ops.iter().any(
        |op| matches!(op, Op::Update { group, delta } if *group == seeded && delta.color == Some(GroupColor::Blue))
    ));
}

#[tokio::test]
async fn below_threshold_members_are_released() {
    let world = Arc::new(TestTabs::new());
    let a = world.add_tab(WIN, "https://a.example.com/");
    let b = world.add_tab(WIN, "https://b.example.com/");
    world.seed_group(WIN, "example", GroupColor::Cyan, &[a, b]);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    assert_eq!(world.group_of(a), GroupId::NONE);
    assert_eq!(world.group_of(b), GroupId::NONE);
    assert!(world.group_by_title(WIN, "example").is_none());
}

#[tokio::test]
async fn unknown_bucket_sorts_first_and_is_never_grouped() {
    let world = Arc::new(TestTabs::new());
    let z = world.add_tab(WIN, "https://zebra.com/");
    let blank = world.add_tab(WIN, "about:blank");
    let devtools = world.add_tab(WIN, "chrome://settings");
    let ext = world.add_tab(WIN, "chrome-extension://abcdef/popup.html");
    let local = world.add_tab(WIN, "file:///tmp/notes.txt");
    world.seed_group(WIN, "junk", GroupColor::Red, &[blank, devtools, ext, local]);
    // Threshold of 2 would group four unparseable tabs if they were eligible.
    let settings = Settings::from_json(r#"{"groupThreshold": 2}"#).unwrap();
    let org = organizer(&world, settings);

    org.organize(WIN).await.unwrap();

    // Unknown bucket leads in its original relative order; zebra trails.
    assert_eq!(world.tab_order(WIN), vec![blank, devtools, ext, local, z]);
    for tab in [blank, devtools, ext, local] {
        assert_eq!(world.group_of(tab), GroupId::NONE);
    }
}

#[tokio::test]
async fn pinned_tabs_are_left_alone() {
    let world = Arc::new(TestTabs::new());
    let p1 = world.add_pinned_tab(WIN, "https://zzz.pinned.com/");
    let p2 = world.add_pinned_tab(WIN, "https://yyy.pinned.com/");
    let b = world.add_tab(WIN, "https://bbb.com/");
    let a = world.add_tab(WIN, "https://aaa.com/");
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    assert_eq!(world.tab_order(WIN), vec![p1, p2, a, b]);
    assert!(!world.ops().iter().any(|op| matches!(op, Op::Move { tab, .. } if *tab == p1 || *tab == p2)));
}

#[tokio::test]
async fn stale_group_reference_downgrades_to_create() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    let seeded = world.seed_group(WIN, "google", GroupColor::Blue, &tabs);
    // The group vanishes after the snapshot the seeding simulated.
    world.dissolve_group(seeded);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();

    let group = world.group_by_title(WIN, "google").expect("recreated");
    assert_ne!(group.id, seeded);
    for tab in &tabs {
        assert_eq!(world.group_of(*tab), group.id);
    }
    assert!(world.ops().iter().any(|op| matches!(op, Op::Create { .. })));
}

#[tokio::test]
async fn failed_operations_are_skipped_and_heal_next_run() {
    let world = Arc::new(TestTabs::new());
    seed_google(&world);
    world.fail_next(OpKind::Move);
    world.fail_next(OpKind::Create);
    let org = organizer(&world, Settings::default());

    // The run completes despite both failures.
    let summary = org.organize(WIN).await.unwrap();
    assert!(!summary.superseded);

    // The next triggering event converges what was left over.
    org.organize(WIN).await.unwrap();
    assert_eq!(
        world.urls_in_order(WIN),
        vec![
            "https://a.google.com/",
            "https://b.google.com/",
            "https://c.google.com/",
            "https://d.google.com/",
        ]
    );
    assert!(world.group_by_title(WIN, "google").is_some());
}

#[tokio::test]
async fn sort_disabled_issues_no_moves() {
    let world = Arc::new(TestTabs::new());
    seed_google(&world);
    let settings = Settings::from_json(r#"{"enableSort": false}"#).unwrap();
    let org = organizer(&world, settings);

    org.organize(WIN).await.unwrap();

    assert!(!world.ops().iter().any(|op| matches!(op, Op::Move { .. })));
    // Grouping still converges.
    assert!(world.group_by_title(WIN, "google").is_some());
}

#[tokio::test]
async fn groups_disabled_issues_no_group_ops() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    world.seed_group(WIN, "misc", GroupColor::Grey, &tabs[..2]);
    let settings = Settings::from_json(r#"{"enableGroups": false}"#).unwrap();
    let org = organizer(&world, settings);

    org.organize(WIN).await.unwrap();

    // Existing physical groups are left entirely alone.
    assert!(world.ops().iter().all(|op| matches!(op, Op::Move { .. })));
    assert!(world.group_by_title(WIN, "misc").is_some());
}

#[tokio::test]
async fn alternate_domain_rules_merge_hosts() {
    let world = Arc::new(TestTabs::new());
    world.add_tab(WIN, "https://a.example.com/");
    world.add_tab(WIN, "https://b.example.com/");
    world.add_tab(WIN, "https://c.example.com/");
    let docs = world.add_tab(WIN, "https://docs.example.dev/guide");
    let settings = Settings {
        alt_domain_rules: vec![AltDomainRule {
            pattern: "^docs\\.example\\.dev/".to_string(),
            host: "example.com".to_string(),
        }],
        ..Settings::default()
    };
    let org = organizer(&world, settings);

    org.organize(WIN).await.unwrap();

    let group = world.group_by_title(WIN, "example").expect("merged group");
    assert_eq!(world.group_of(docs), group.id);
}

#[tokio::test]
async fn color_rules_longest_prefix_wins_end_to_end() {
    let world = Arc::new(TestTabs::new());
    for at in 0..4 {
        world.add_tab(WIN, &format!("https://maps.google.com/{at}"));
    }
    let settings = Settings {
        group_color_rules: vec![
            ColorRule {
                prefix: "google".to_string(),
                color: GroupColor::Blue,
            },
            ColorRule {
                prefix: "google maps".to_string(),
                color: GroupColor::Green,
            },
        ],
        ..Settings::default()
    };
    let org = organizer(&world, settings);

    org.organize(WIN).await.unwrap();

    let group = world.group_by_title(WIN, "google maps").expect("group");
    assert_eq!(group.color, GroupColor::Green);
}

#[tokio::test]
async fn config_change_reorganizes_tracked_windows() {
    let world = Arc::new(TestTabs::new());
    world.add_tab(WIN, "https://a.google.com/");
    world.add_tab(WIN, "https://b.google.com/");
    world.add_tab(WIN, "https://c.google.com/");
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();
    assert!(world.group_by_title(WIN, "google").is_none());

    org.update_settings(Settings::from_json(r#"{"groupThreshold": 3}"#).unwrap());
    org.handle_event(TabEvent::ConfigChanged).await.unwrap();
    assert!(world.group_by_title(WIN, "google").is_some());
}

#[tokio::test]
async fn closing_a_window_drops_its_session() {
    let world = Arc::new(TestTabs::new());
    let tab = world.add_tab(WIN, "https://a.example.com/");
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await.unwrap();
    org.handle_event(TabEvent::Removed {
        window: WIN,
        tab,
        window_closing: true,
    })
    .await
    .unwrap();

    world.clear_ops();
    org.handle_event(TabEvent::ConfigChanged).await.unwrap();
    assert!(world.ops().is_empty(), "no tracked windows remain");
}

#[tokio::test]
async fn update_events_trigger_runs() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    let org = organizer(&world, Settings::default());

    org.handle_event(TabEvent::Updated {
        window: WIN,
        tab: tabs[0],
        change: TabChange::Url,
    })
    .await
    .unwrap();
    assert!(world.group_by_title(WIN, "google").is_some());
}

#[tokio::test(start_paused = true)]
async fn activation_touches_recency_and_collapses_idle_groups() {
    let world = Arc::new(TestTabs::new());
    let mut alpha_tabs = Vec::new();
    let mut beta_tabs = Vec::new();
    for at in 0..4 {
        alpha_tabs.push(world.add_tab(WIN, &format!("https://alpha.com/{at}")));
        beta_tabs.push(world.add_tab(WIN, &format!("https://beta.com/{at}")));
    }
    world.seed_group(WIN, "alpha", GroupColor::Yellow, &alpha_tabs);
    let beta = world.seed_group(WIN, "beta", GroupColor::Purple, &beta_tabs);
    let settings =
        Settings::from_json(r#"{"autoCollapseEnabled": true, "autoCollapseLimit": 1}"#).unwrap();
    let org = organizer(&world, settings);

    // Visiting alpha leaves it expanded and collapses idle beta.
    org.handle_event(TabEvent::Activated {
        window: WIN,
        tab: alpha_tabs[0],
    })
    .await
    .unwrap();
    assert!(!world.group_by_title(WIN, "alpha").unwrap().collapsed);
    assert!(world.group_by_title(WIN, "beta").unwrap().collapsed);

    // Visiting beta evicts alpha from the one-slot recency list; alpha
    // collapses, and already-collapsed beta is left untouched.
    world.clear_ops();
    org.handle_event(TabEvent::Activated {
        window: WIN,
        tab: beta_tabs[0],
    })
    .await
    .unwrap();
    assert!(world.group_by_title(WIN, "alpha").unwrap().collapsed);
    assert!(!world.ops().iter().any(
        |op| matches!(op, Op::Update { group, .. } if *group == beta)
    ));
}

#[tokio::test(start_paused = true)]
async fn activation_is_a_no_op_when_auto_collapse_is_off() {
    let world = Arc::new(TestTabs::new());
    let tabs = seed_google(&world);
    world.seed_group(WIN, "google", GroupColor::Blue, &tabs);
    let org = organizer(&world, Settings::default());

    org.handle_event(TabEvent::Activated {
        window: WIN,
        tab: tabs[0],
    })
    .await
    .unwrap();
    assert!(world.ops().is_empty());
}

/// Host wrapper that parks every move until permits arrive, so a test can
/// hold a run mid-flight.
struct GatedTabs {
    inner: Arc<TestTabs>,
    gate: tokio::sync::Semaphore,
}

#[async_trait]
impl TabOps for GatedTabs {
    async fn list_tabs(&self, window: WindowId, pinned: Option<bool>) -> WorldResult<Vec<TabInfo>> {
        self.inner.list_tabs(window, pinned).await
    }

    async fn move_tab(&self, tab: TabId, index: usize) -> WorldResult<()> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| WorldError::Rejected("gate closed".to_string()))?;
        permit.forget();
        self.inner.move_tab(tab, index).await
    }

    async fn get_group(&self, group: GroupId) -> WorldResult<TabGroupInfo> {
        self.inner.get_group(group).await
    }

    async fn query_groups(&self, window: WindowId) -> WorldResult<Vec<TabGroupInfo>> {
        self.inner.query_groups(window).await
    }

    async fn create_group(&self, window: WindowId, tabs: &[TabId]) -> WorldResult<GroupId> {
        self.inner.create_group(window, tabs).await
    }

    async fn add_to_group(&self, tabs: &[TabId], group: GroupId) -> WorldResult<()> {
        self.inner.add_to_group(tabs, group).await
    }

    async fn update_group(&self, group: GroupId, delta: GroupDelta) -> WorldResult<()> {
        self.inner.update_group(group, delta).await
    }

    async fn ungroup(&self, tabs: &[TabId]) -> WorldResult<()> {
        self.inner.ungroup(tabs).await
    }
}

#[tokio::test]
async fn newer_run_supersedes_the_in_flight_run() {
    let world = Arc::new(TestTabs::new());
    seed_google(&world);
    let gated = Arc::new(GatedTabs {
        inner: world.clone(),
        gate: tokio::sync::Semaphore::new(0),
    });
    let gated_ops: Arc<dyn TabOps> = gated.clone();
    let org = Arc::new(Organizer::new(gated_ops, Settings::default()));

    let first = tokio::spawn({
        let org = org.clone();
        async move { org.organize(WIN).await }
    });
    // Let the first run park on its first gated move.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let second = tokio::spawn({
        let org = org.clone();
        async move { org.organize(WIN).await }
    });
    // The second run cancels the first's token and queues on the run lock.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    gated.gate.add_permits(64);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(first.superseded, "older run must notice supersession");
    assert!(!second.superseded);

    // The fresh run converged the window regardless.
    assert_eq!(
        world.urls_in_order(WIN),
        vec![
            "https://a.google.com/",
            "https://b.google.com/",
            "https://c.google.com/",
            "https://d.google.com/",
        ]
    );
    assert!(world.group_by_title(WIN, "google").is_some());
}

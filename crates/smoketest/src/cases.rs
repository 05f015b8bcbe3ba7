//! The individual smoketest scenarios.

use std::sync::Arc;

use config::Settings;
use tabtidy_engine::Organizer;
use tabtidy_world::{GroupColor, GroupId, TabChange, TabEvent, TabOps, TestTabs, WindowId};
use tracing::info;

use crate::error::{Error, Result};

/// The window every single-window case runs in.
const WIN: WindowId = 1;

/// Fail with a check error unless `cond` holds.
fn check(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::Check(msg.to_string()))
    }
}

/// Re-run the organizer and require an empty operation set.
async fn check_converged(world: &TestTabs, org: &Organizer) -> Result<()> {
    world.clear_ops();
    org.organize(WIN).await?;
    check(
        world.ops().is_empty(),
        "re-running on a converged window issued operations",
    )
}

fn organizer(world: &Arc<TestTabs>, settings: Settings) -> Organizer {
    let ops: Arc<dyn TabOps> = world.clone();
    Organizer::new(ops, settings)
}

/// Mixed locators converge to reversed-domain order, unknown bucket first.
pub async fn sort() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    world.add_tab(WIN, "https://news.ycombinator.com/item?id=1");
    world.add_tab(WIN, "https://192.168.0.1:9090/admin");
    world.add_tab(WIN, "https://en.wikipedia.org/wiki/Rust");
    world.add_tab(WIN, "about:blank");
    world.add_tab(WIN, "https://doc.rust-lang.org/book/");
    let org = organizer(&world, Settings::default());

    let summary = org.organize(WIN).await?;
    info!("sort case moved {} tabs", summary.moves);

    let expected = vec![
        "about:blank".to_string(),
        "https://192.168.0.1:9090/admin".to_string(),
        "https://doc.rust-lang.org/book/".to_string(),
        "https://en.wikipedia.org/wiki/Rust".to_string(),
        "https://news.ycombinator.com/item?id=1".to_string(),
    ];
    check(
        world.urls_in_order(WIN) == expected,
        &format!("unexpected order: {:?}", world.urls_in_order(WIN)),
    )?;
    check_converged(&world, &org).await
}

/// Threshold-sized clusters become titled, colored physical groups.
pub async fn groups() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    for sub in ["a", "b", "c", "d"] {
        world.add_tab(WIN, &format!("https://{sub}.google.com/"));
    }
    for at in 0..4 {
        world.add_tab(WIN, &format!("https://stackoverflow.com/questions/{at}"));
    }
    let duck = world.add_tab(WIN, "https://duckduckgo.com/");
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await?;

    let google = world
        .group_by_title(WIN, "google")
        .ok_or_else(|| Error::Check("no google group".to_string()))?;
    check(google.color == GroupColor::Blue, "google group not blue")?;
    let stack = world
        .group_by_title(WIN, "stackoverflow")
        .ok_or_else(|| Error::Check("no stackoverflow group".to_string()))?;
    check(stack.color == GroupColor::Orange, "stackoverflow group not orange")?;
    check(
        world.group_of(duck) == GroupId::NONE,
        "lone duckduckgo tab must stay ungrouped",
    )?;
    check_converged(&world, &org).await
}

/// Pre-existing wrong grouping state gets repaired, not accumulated.
pub async fn repair() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    let g1 = world.add_tab(WIN, "https://a.google.com/");
    let g2 = world.add_tab(WIN, "https://b.google.com/");
    let g3 = world.add_tab(WIN, "https://c.google.com/");
    let g4 = world.add_tab(WIN, "https://d.google.com/");
    let e1 = world.add_tab(WIN, "https://example.com/1");
    let e2 = world.add_tab(WIN, "https://example.com/2");
    // Two google tabs already in the right group, one in a wrong one, one
    // loose; two example tabs grouped below threshold.
    let right = world.seed_group(WIN, "google", GroupColor::Blue, &[g1, g2]);
    world.seed_group(WIN, "Shopping", GroupColor::Pink, &[g3]);
    world.seed_group(WIN, "example", GroupColor::Cyan, &[e1, e2]);
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await?;

    for tab in [g1, g2, g3, g4] {
        check(world.group_of(tab) == right, "google tabs must share the titled group")?;
    }
    check(
        world.group_by_title(WIN, "Shopping").is_none(),
        "emptied wrong group must dissolve",
    )?;
    for tab in [e1, e2] {
        check(
            world.group_of(tab) == GroupId::NONE,
            "below-threshold tabs must be released",
        )?;
    }
    check_converged(&world, &org).await
}

/// Activations keep recent groups expanded and collapse idle ones.
pub async fn collapse() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    let mut alpha_tabs = Vec::new();
    let mut beta_tabs = Vec::new();
    for at in 0..4 {
        alpha_tabs.push(world.add_tab(WIN, &format!("https://alpha.com/{at}")));
        beta_tabs.push(world.add_tab(WIN, &format!("https://beta.com/{at}")));
    }
    world.seed_group(WIN, "alpha", GroupColor::Yellow, &alpha_tabs);
    world.seed_group(WIN, "beta", GroupColor::Purple, &beta_tabs);
    let settings =
        Settings::from_json(r#"{"autoCollapseEnabled": true, "autoCollapseLimit": 1}"#)
            .map_err(|e| Error::Check(format!("settings: {e}")))?;
    let org = organizer(&world, settings);

    org.handle_event(TabEvent::Activated {
        window: WIN,
        tab: alpha_tabs[0],
    })
    .await?;
    check(
        !world.group_by_title(WIN, "alpha").unwrap().collapsed,
        "recently used group must stay expanded",
    )?;
    check(
        world.group_by_title(WIN, "beta").unwrap().collapsed,
        "idle group must collapse",
    )?;

    org.handle_event(TabEvent::Activated {
        window: WIN,
        tab: beta_tabs[0],
    })
    .await?;
    check(
        world.group_by_title(WIN, "alpha").unwrap().collapsed,
        "evicted group must collapse",
    )
}

/// A stream of tab events keeps the window converged throughout.
pub async fn churn() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    let first = world.add_tab(WIN, "https://en.wikipedia.org/");
    let org = organizer(&world, Settings::default());
    org.handle_event(TabEvent::Created {
        window: WIN,
        tab: first,
    })
    .await?;

    // Open a burst of tabs.
    let mut opened = Vec::new();
    for sub in ["mail", "maps", "drive", "docs"] {
        let tab = world.add_tab(WIN, &format!("https://{sub}.google.com/"));
        opened.push(tab);
        org.handle_event(TabEvent::Created { window: WIN, tab }).await?;
    }
    check(
        world.group_by_title(WIN, "google").is_some(),
        "burst of subdomains must form a group",
    )?;

    // One tab navigates away; the group shrinks below threshold.
    world.set_url(opened[0], "https://news.ycombinator.com/");
    org.handle_event(TabEvent::Updated {
        window: WIN,
        tab: opened[0],
        change: TabChange::Url,
    })
    .await?;
    check(
        world.group_by_title(WIN, "google").is_none(),
        "shrunken cluster must be released",
    )?;

    // Closing tabs re-converges what is left.
    world.remove_tab(opened[1]);
    org.handle_event(TabEvent::Removed {
        window: WIN,
        tab: opened[1],
        window_closing: false,
    })
    .await?;
    check_converged(&world, &org).await
}

/// Windows are organized independently.
pub async fn windows() -> Result<()> {
    let world = Arc::new(TestTabs::new());
    let other: WindowId = 2;
    for sub in ["a", "b", "c", "d"] {
        world.add_tab(WIN, &format!("https://{sub}.google.com/"));
        world.add_tab(other, &format!("https://{sub}.stackoverflow.com/"));
    }
    let org = organizer(&world, Settings::default());

    org.organize(WIN).await?;
    check(
        world.group_by_title(WIN, "google").is_some(),
        "window 1 must group google",
    )?;
    check(
        world.group_by_title(other, "stackoverflow").is_none(),
        "window 2 must be untouched until its own run",
    )?;

    org.organize(other).await?;
    check(
        world.group_by_title(other, "stackoverflow").is_some(),
        "window 2 must group stackoverflow",
    )
}

//! commute: end-to-end run of the nav routing session.
//!
//! Builds a synthetic two-region street map, then:
//!
//! 1. plans a short walk with the router the session recommends,
//! 2. drives across the region border, follows the route, takes a wrong
//!    turn, and lets the session rebuild,
//! 3. asks for a destination in a region that was never downloaded.
//!
//! Logs at `info` by default; set `RUST_LOG=debug` to watch the build worker.

mod network;

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nav_core::{GeoPoint, RouterType};
use nav_follow::LocationFix;
use nav_session::{BuildResult, BuildStats, MemoryPreferences, RoutingListener, RoutingSession, SessionBuilder, SessionState};

use network::build_network;

// ── Constants ─────────────────────────────────────────────────────────────────

const BUILD_TIMEOUT: Duration = Duration::from_secs(10);

const HOME:       GeoPoint = GeoPoint::new(30.670, -88.085);
const BAKERY:     GeoPoint = GeoPoint::new(30.690, -88.075);
const OFFICE:     GeoPoint = GeoPoint::new(30.710, -88.035);
const WRONG_TURN: GeoPoint = GeoPoint::new(30.710, -88.070);
const LAKE_HOUSE: GeoPoint = GeoPoint::new(30.750, -88.050);

// ── Listener ──────────────────────────────────────────────────────────────────

/// Prints every notification.
struct ConsoleListener;

impl RoutingListener for ConsoleListener {
    fn on_route_built(&mut self, result: &BuildResult) {
        match &result.route {
            Some(route) => println!(
                "  built: {} ({} router, {:.0} m, {} points, {} turns)",
                result.code,
                route.router_type(),
                route.length_m(),
                route.point_count(),
                route.turns().len(),
            ),
            None => println!("  built: {}", result.code),
        }
        if !result.absent_maps.is_empty() {
            println!("    download maps for regions {:?}", result.absent_maps);
        }
        if !result.absent_routing.is_empty() {
            println!("    download routing for regions {:?}", result.absent_routing);
        }
    }

    fn on_progress(&mut self, percent: f32) {
        println!("  progress {percent:>5.1}%");
    }

    fn on_statistics(&mut self, stats: &BuildStats) {
        println!(
            "  stats: {} visited, {:.1} ms{}",
            stats.visited,
            stats.elapsed.as_secs_f64() * 1_000.0,
            stats.cache.map(|c| format!(", cache {}/{} misses", c.misses, c.accesses)).unwrap_or_default(),
        );
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_and_wait(session: &mut RoutingSession, start: GeoPoint, finish: GeoPoint) -> Result<()> {
    let t0 = Instant::now();
    let id = session.build_route(start, finish, BUILD_TIMEOUT)?;
    println!("  build #{id}: {start} → {finish}");
    if !session.wait_idle(BUILD_TIMEOUT)? {
        bail!("build #{id} did not finish within {BUILD_TIMEOUT:?}");
    }
    println!("  state {} after {:.1} ms", session.state(), t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(())
}

/// Feed the first `stop` route vertices as location fixes.
fn drive(session: &mut RoutingSession, stop: usize) -> Result<()> {
    let Some(route) = session.route() else { return Ok(()) };
    for p in route.points().iter().take(stop) {
        if let Some(m) = session.on_location(LocationFix::new(*p))? {
            let turn = session
                .next_turn()
                .map(|t| format!("turn in {:.0} m", t.distance_m))
                .unwrap_or_else(|| "no turn ahead".into());
            println!(
                "  at {:>6.0} m of {:.0} m, {:.0} m left, {turn}",
                m.distance_from_begin_m,
                route.length_m(),
                session.remaining_distance_m().unwrap_or(0.0),
            );
        }
    }
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== commute: nav routing session ===");
    let net = build_network()?;
    let mut session = SessionBuilder::new(net.store, net.resolver, net.catalog)
        .listener(Box::new(ConsoleListener))
        .preferences(Box::new(MemoryPreferences::new()))
        .build()?;
    println!();

    // 1. A walk to the bakery.
    let router = session.select_router(HOME, BAKERY);
    println!("Walk to the bakery: {router} router recommended, walking anyway");
    session.set_active_router(RouterType::Pedestrian)?;
    build_and_wait(&mut session, HOME, BAKERY)?;
    session.close_routing()?;
    println!();

    // 2. Drive to the office, missing a turn on the way.
    println!("Drive to the office");
    session.set_active_router(RouterType::Vehicle)?;
    build_and_wait(&mut session, HOME, OFFICE)?;
    if session.state() != SessionState::Ready {
        bail!("no route to the office");
    }
    session.follow_route()?;
    drive(&mut session, 4)?;

    println!("  wrong turn at {WRONG_TURN}");
    for _ in 0..session.settings().deviation_window {
        session.on_location(LocationFix::new(WRONG_TURN))?;
    }
    println!("  state {}", session.state());
    if !session.wait_idle(BUILD_TIMEOUT)? {
        bail!("rebuild did not finish within {BUILD_TIMEOUT:?}");
    }
    println!("  state {}", session.state());
    drive(&mut session, usize::MAX)?;
    session.close_routing()?;
    println!();

    // 3. The lake house is in a region we never downloaded.
    println!("Drive to the lake house");
    build_and_wait(&mut session, HOME, LAKE_HOUSE)?;

    session.shutdown()?;
    info!("commute demo finished");
    Ok(())
}

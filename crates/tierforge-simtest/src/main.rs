//! Tierforge Headless Simulation Harness
//!
//! Drives the merge engine through scripted scenarios and a long mixed
//! session, checking engine invariants along the way. Runs entirely
//! in-process, no renderer.
//!
//! Usage:
//!   cargo run -p tierforge-simtest
//!   cargo run -p tierforge-simtest -- --verbose
//!   RUST_LOG=debug cargo run -p tierforge-simtest

use serde::Deserialize;
use tierforge_core::prelude::*;
use tierforge_core::systems::recompute_inventory;

// ── Taxonomy (same JSON a game client would ship) ───────────────────────
const TAXONOMY_JSON: &str = include_str!("../../../data/taxonomy.json");

/// Fields of the engine snapshot the harness reads back
#[derive(Debug, Deserialize)]
struct SnapshotHead {
    tick: u64,
    particle_count: usize,
    jobs: Vec<serde_json::Value>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn check(name: &str, passed: bool, detail: String) -> Self {
        Self {
            name: name.into(),
            passed,
            detail,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Tierforge Simulation Harness ===\n");

    let taxonomy = match Taxonomy::from_json_str(TAXONOMY_JSON) {
        Ok(t) => t,
        Err(e) => {
            println!("  ✗ taxonomy_parse: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Taxonomy file
    results.extend(validate_taxonomy(&taxonomy, verbose));

    // 2. Animated size merge
    results.extend(validate_size_merge(&taxonomy, verbose));

    // 3. Forge promotion and bulk compression
    results.extend(validate_tier_conversions(&taxonomy, verbose));

    // 4. Performance governor
    results.extend(validate_governor(&taxonomy, verbose));

    // 5. Job timeout
    results.extend(validate_timeout(&taxonomy, verbose));

    // 6. Long mixed session
    results.extend(validate_long_session(&taxonomy, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn fill(engine: &mut MergeEngine, tier: Tier, size: SizeClass, pos: Vec2, n: usize) {
    for _ in 0..n {
        engine.spawn_particle(tier, size, pos);
    }
}

// ── 1. Taxonomy ─────────────────────────────────────────────────────────

fn validate_taxonomy(taxonomy: &Taxonomy, verbose: bool) -> Vec<TestResult> {
    println!("--- Taxonomy ---");
    let mut results = Vec::new();

    results.push(TestResult::check(
        "taxonomy_tiers",
        taxonomy.tier_count() >= 3,
        format!("{} tiers", taxonomy.tier_count()),
    ));

    let anchored = taxonomy
        .tier_ids()
        .filter(|&t| taxonomy.generator(t).is_some())
        .count();
    results.push(TestResult::check(
        "taxonomy_generators",
        anchored == taxonomy.tier_count(),
        format!("{}/{} tiers anchored", anchored, taxonomy.tier_count()),
    ));

    results.push(TestResult::check(
        "taxonomy_forge",
        taxonomy.forge.is_some(),
        format!("forge at {:?}", taxonomy.forge),
    ));

    let tuning = &taxonomy.tuning;
    results.push(TestResult::check(
        "taxonomy_thresholds",
        tuning.population_cap >= tuning.performance_threshold
            && tuning.performance_threshold > tuning.group_threshold as usize,
        format!(
            "group {}, perf {}, cap {}",
            tuning.group_threshold, tuning.performance_threshold, tuning.population_cap
        ),
    ));

    if verbose {
        for tier in taxonomy.tier_ids() {
            if let Some(spec) = taxonomy.tier(tier) {
                println!("    tier {} '{}' at {:?}", tier.index(), spec.name, spec.generator);
            }
        }
    }

    results
}

// ── 2. Size merge ───────────────────────────────────────────────────────

fn validate_size_merge(taxonomy: &Taxonomy, _verbose: bool) -> Vec<TestResult> {
    println!("--- Size Merge ---");
    let mut results = Vec::new();

    let mut engine = MergeEngine::with_seed(taxonomy.clone(), 1);
    let anchor = taxonomy.generator(Tier(0)).unwrap_or_default();
    let threshold = taxonomy.tuning.group_threshold as usize;
    fill(&mut engine, Tier(0), SizeClass::Small, anchor, threshold);

    let report = engine.tick(0.1);
    let mediums = engine.count_particles(Tier(0), SizeClass::Medium);
    results.push(TestResult::check(
        "size_merge_one_medium",
        report.completed.len() == 1 && mediums == 1 && engine.particle_count() == 1,
        format!(
            "{} completed, {} mediums, {} alive",
            report.completed.len(),
            mediums,
            engine.particle_count()
        ),
    ));

    results.push(TestResult::check(
        "size_merge_inventory",
        engine.inventory().get(Tier(0)) == threshold as u64,
        format!("inventory {:?}", engine.inventory().get(Tier(0))),
    ));

    let shockwaves = engine.drain_shockwaves();
    results.push(TestResult::check(
        "size_merge_shockwave",
        shockwaves.len() == 1 && shockwaves[0].position == anchor,
        format!("{} shockwaves", shockwaves.len()),
    ));

    let cooldown = engine.tick(0.1);
    results.push(TestResult::check(
        "size_merge_cooldown",
        cooldown.started.is_none() && engine.active_jobs().is_empty(),
        "no job the tick after a completion".into(),
    ));

    results
}

// ── 3. Tier conversions ─────────────────────────────────────────────────

fn validate_tier_conversions(taxonomy: &Taxonomy, _verbose: bool) -> Vec<TestResult> {
    println!("--- Tier Conversions ---");
    let mut results = Vec::new();

    let Some(forge) = taxonomy.forge else {
        results.push(TestResult::check("forge_anchor", false, "taxonomy has no forge".into()));
        return results;
    };

    let mut engine = MergeEngine::with_seed(taxonomy.clone(), 2);
    engine.set_merging_enabled(false);
    engine.set_promotion_enabled(true);
    fill(&mut engine, Tier(0), SizeClass::ExtraLarge, forge, 1);

    let idle = engine.tick(0.1);
    results.push(TestResult::check(
        "forge_waits_for_crunch",
        idle.started.is_none(),
        format!("started {:?}", idle.started),
    ));

    engine.set_crunch_active(true);
    engine.tick(0.1);
    results.push(TestResult::check(
        "forge_promotes_two_tiers",
        engine.count_particles(Tier(2), SizeClass::Medium) == 1
            && engine.is_unlocked(Tier(2))
            && engine.pending_shockwaves() == 0,
        format!(
            "tier 2 mediums {}, unlocked {}",
            engine.count_particles(Tier(2), SizeClass::Medium),
            engine.is_unlocked(Tier(2))
        ),
    ));

    let mut engine = MergeEngine::with_seed(taxonomy.clone(), 3);
    engine.set_merging_enabled(false);
    engine.set_promotion_enabled(true);
    let group = taxonomy.tuning.group_threshold as usize;
    fill(&mut engine, Tier(1), SizeClass::ExtraLarge, Vec2::new(900.0, 600.0), group);
    let report = engine.tick(0.1);
    let created = engine.count_particles(Tier(2), SizeClass::ExtraLarge);
    results.push(TestResult::check(
        "bulk_compression",
        report.completed.len() == 1
            && created == taxonomy.tuning.bulk_conversion_count as usize
            && engine.count_particles(Tier(1), SizeClass::ExtraLarge) == 0,
        format!("{} tier 2 extra-large created", created),
    ));

    results
}

// ── 4. Governor ─────────────────────────────────────────────────────────

fn validate_governor(taxonomy: &Taxonomy, _verbose: bool) -> Vec<TestResult> {
    println!("--- Performance Governor ---");
    let mut results = Vec::new();

    let mut small = taxonomy.clone();
    small.tuning.performance_threshold = 200;
    small.tuning.population_cap = 1_000;
    let mut engine = MergeEngine::with_seed(small, 4);
    let anchor = taxonomy.generator(Tier(0)).unwrap_or_default();
    fill(&mut engine, Tier(0), SizeClass::Small, anchor, 200);
    fill(&mut engine, Tier(1), SizeClass::Small, Vec2::new(1_500.0, 1_500.0), 100);

    let report = engine.tick(0.1);
    let conversions = report.governor.map(|g| g.conversions).unwrap_or(0);
    results.push(TestResult::check(
        "governor_two_mediums",
        conversions == 2 && engine.count_particles(Tier(0), SizeClass::Medium) == 2,
        format!("{} conversions, {} alive", conversions, engine.particle_count()),
    ));

    results.push(TestResult::check(
        "governor_no_side_effects",
        engine.active_jobs().is_empty()
            && engine.pending_shockwaves() == 0
            && report.started.is_none(),
        format!(
            "{} jobs, {} shockwaves",
            engine.active_jobs().len(),
            engine.pending_shockwaves()
        ),
    ));

    results
}

// ── 5. Timeout ──────────────────────────────────────────────────────────

fn validate_timeout(taxonomy: &Taxonomy, _verbose: bool) -> Vec<TestResult> {
    println!("--- Job Timeout ---");
    let mut results = Vec::new();

    let mut engine = MergeEngine::with_seed(taxonomy.clone(), 5);
    let anchor = taxonomy.generator(Tier(0)).unwrap_or_default();
    let offset = taxonomy.tuning.conversion_radius * 0.5;
    let threshold = taxonomy.tuning.group_threshold as usize;
    fill(&mut engine, Tier(0), SizeClass::Small, anchor + Vec2::new(offset, 0.0), threshold);

    let first = engine.tick(0.1);
    results.push(TestResult::check(
        "timeout_job_pending",
        first.started.is_some() && first.completed.is_empty(),
        format!("{} active", engine.active_jobs().len()),
    ));

    let second = engine.tick(taxonomy.tuning.job_timeout * 10.0);
    let timed_out = second.completed.first().is_some_and(|j| j.timed_out);
    results.push(TestResult::check(
        "timeout_completes",
        timed_out
            && engine.count_particles(Tier(0), SizeClass::Medium) == 1
            && engine.particle_count() == 1,
        format!("timed out {}, {} alive", timed_out, engine.particle_count()),
    ));

    results
}

// ── 6. Long session ─────────────────────────────────────────────────────

fn validate_long_session(taxonomy: &Taxonomy, verbose: bool) -> Vec<TestResult> {
    println!("--- Long Session ---");
    let mut results = Vec::new();

    let mut engine = MergeEngine::with_seed(taxonomy.clone(), 6);
    engine.set_promotion_enabled(true);

    let mut max_jobs = 0;
    let mut ownership_errors = Vec::new();
    let mut inventory_mismatches = 0;
    let mut unlock_regressions = 0;
    let mut unlocked = 1;
    let ticks = 3_000;

    for tick in 0..ticks {
        for i in 0..20 {
            engine.spawn_at_generator(Tier(((tick + i) % 3) as u8), SizeClass::Small);
        }
        // Crunch window every ten seconds
        engine.set_crunch_active(tick % 300 < 60);
        engine.advance_motion(1.0 / 30.0);
        engine.tick(1.0 / 30.0);

        max_jobs = max_jobs.max(engine.active_jobs().len());
        if let Err(e) = engine.check_ownership() {
            ownership_errors.push(e);
        }
        if engine.inventory() != &recompute_inventory(engine.world(), engine.taxonomy()) {
            inventory_mismatches += 1;
        }
        let now = engine.unlocks().unlocked().count();
        if now < unlocked {
            unlock_regressions += 1;
        }
        unlocked = now;
        engine.drain_shockwaves();

        if verbose && tick % 600 == 0 {
            println!(
                "    tick {:>5}: {} particles, stats {:?}",
                tick,
                engine.particle_count(),
                engine.stats()
            );
        }
    }

    results.push(TestResult::check(
        "session_single_flight",
        max_jobs <= 1,
        format!("max {} concurrent jobs", max_jobs),
    ));
    results.push(TestResult::check(
        "session_ownership",
        ownership_errors.is_empty(),
        match ownership_errors.first() {
            Some(e) => format!("{} violations, first: {}", ownership_errors.len(), e),
            None => "no violations".into(),
        },
    ));
    results.push(TestResult::check(
        "session_inventory_identity",
        inventory_mismatches == 0,
        format!("{} mismatched ticks", inventory_mismatches),
    ));
    results.push(TestResult::check(
        "session_unlocks_monotonic",
        unlock_regressions == 0,
        format!("{} tiers unlocked", unlocked),
    ));
    results.push(TestResult::check(
        "session_population_cap",
        engine.particle_count() <= taxonomy.tuning.population_cap,
        format!("{} particles", engine.particle_count()),
    ));

    let stats = engine.stats();
    results.push(TestResult::check(
        "session_activity",
        stats.size_merges > 0,
        format!("{:?}", stats),
    ));

    let snapshot: Result<SnapshotHead, _> = serde_json::from_str(&engine.snapshot_json());
    results.push(match snapshot {
        Ok(head) => TestResult::check(
            "session_snapshot",
            head.tick == ticks as u64
                && head.particle_count == engine.particle_count()
                && head.jobs.len() == engine.active_jobs().len(),
            format!("tick {}, {} particles", head.tick, head.particle_count),
        ),
        Err(e) => TestResult::check("session_snapshot", false, format!("parse error: {}", e)),
    });
    if verbose {
        match engine.snapshot().to_json_pretty() {
            Ok(json) => println!("    final snapshot:\n{}", json),
            Err(e) => println!("    final snapshot unavailable: {}", e),
        }
    }

    results
}

//! Homegen Headless Generation Harness
//!
//! Sweeps seeds over a few built-in house specs and validates every scene.
//! Runs entirely in-process: no engine, no rendering.
//!
//! Usage:
//!   cargo run -p homegen-simtest
//!   cargo run -p homegen-simtest -- --verbose --scenes 50 --out scene.json

use std::time::Instant;

use homegen_logic::config::validate_config;
use homegen_logic::room_spec::LeafRoom;
use homegen_logic::scene::InstanceRole;
use homegen_logic::validation::{validate_scene, Severity};
use homegen_logic::{
    GenerationConfig, GenerationError, HouseGenerator, ObjectDatabase, ReceptacleRequest,
    RoomNode, RoomSpec, RoomType, SceneDocument, SceneRequest,
};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Object database (same JSON the library tests use) ───────────────────
const DB_JSON: &str = include_str!("../../../data/object_db.json");

/// Extra attempts with derived seeds when a spec cannot be realized.
const MAX_SEED_RETRIES: u64 = 3;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Args {
    verbose: bool,
    scenes: u64,
    seed: u64,
    out: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        verbose: false,
        scenes: 20,
        seed: 0,
        out: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--verbose" => args.verbose = true,
            "--scenes" => args.scenes = it.next().and_then(|v| v.parse().ok()).unwrap_or(args.scenes),
            "--seed" => args.seed = it.next().and_then(|v| v.parse().ok()).unwrap_or(args.seed),
            "--out" => args.out = it.next(),
            other => eprintln!("ignoring unknown argument {}", other),
        }
    }
    args
}

fn main() {
    let args = parse_args();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| if args.verbose { "info".into() } else { "warn".into() }),
        )
        .init();

    println!("=== Homegen Generation Harness ===\n");

    let mut results = Vec::new();

    // 1. Object database
    let db = match ObjectDatabase::from_json(DB_JSON) {
        Ok(db) => db,
        Err(e) => {
            println!("  ✗ database_parse: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_database(&db, args.verbose));

    // 2. Config validation
    results.extend(validate_configs(&db));

    // 3. Scene sweep
    let generator = match HouseGenerator::new(&db, GenerationConfig::default()) {
        Ok(g) => g,
        Err(e) => {
            println!("  ✗ generator_new: {}", e);
            std::process::exit(1);
        }
    };
    let (sweep, first_scene) = sweep_scenes(&generator, &args);
    results.extend(sweep);

    // 4. Determinism
    results.extend(validate_determinism(&generator, args.seed));

    if let (Some(path), Some(scene)) = (&args.out, first_scene) {
        match scene.to_json_pretty().map(|json| std::fs::write(path, json)) {
            Ok(Ok(())) => println!("\nwrote first scene to {}", path),
            Ok(Err(e)) => warn!("could not write {}: {}", path, e),
            Err(e) => warn!("could not serialize scene: {}", e),
        }
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
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

// ── Built-in specs ──────────────────────────────────────────────────────

fn builtin_specs() -> Vec<(&'static str, RoomSpec, SceneRequest)> {
    vec![
        (
            "single_bedroom",
            RoomSpec::new(vec![RoomNode::leaf(1, RoomType::Bedroom, 1.0)]),
            SceneRequest::default(),
        ),
        (
            "bed_and_living",
            RoomSpec::new(vec![
                RoomNode::leaf(1, RoomType::Bedroom, 1.0),
                RoomNode::leaf(2, RoomType::LivingRoom, 1.0),
            ])
            .with_dims(7, 7),
            SceneRequest::default(),
        ),
        (
            "family_house",
            RoomSpec::new(vec![
                RoomNode::meta(vec![
                    RoomNode::leaf(1, RoomType::Bedroom, 1.0),
                    RoomNode::leaf(2, RoomType::Bathroom, 0.5),
                ]),
                RoomNode::meta(vec![
                    RoomNode::leaf(3, RoomType::Bedroom, 1.0),
                    RoomNode::Leaf(LeafRoom {
                        room_id: 4,
                        room_type: RoomType::Bathroom,
                        ratio: 0.5,
                        avoid_doors_from_metarooms: true,
                    }),
                ]),
                RoomNode::leaf(5, RoomType::Kitchen, 1.0),
                RoomNode::leaf(6, RoomType::LivingRoom, 2.0),
            ]),
            SceneRequest::default(),
        ),
        (
            "kitchen_with_table",
            RoomSpec::new(vec![
                RoomNode::leaf(1, RoomType::Kitchen, 1.0),
                RoomNode::leaf(2, RoomType::LivingRoom, 1.0),
            ])
            .with_dims(6, 6),
            SceneRequest {
                receptacles: vec![ReceptacleRequest {
                    object_type: "dining_table".into(),
                    count: 1,
                    objects: vec![[("apple".to_string(), 2), ("cup".to_string(), 1)].into()],
                }],
            },
        ),
    ]
}

// ── 1. Object Database ──────────────────────────────────────────────────

fn validate_database(db: &ObjectDatabase, verbose: bool) -> Vec<TestResult> {
    println!("--- Object Database ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "db_not_empty".into(),
        passed: !db.prefabs.is_empty() && !db.object_types.is_empty(),
        detail: format!(
            "{} prefabs, {} object types, {} groups",
            db.prefabs.len(),
            db.object_types.len(),
            db.asset_groups.len()
        ),
    });

    // Every room type has something to put on the floor
    let empty_rooms: Vec<RoomType> = RoomType::ALL
        .into_iter()
        .filter(|&rt| {
            !db.object_types
                .values()
                .any(|t| t.on_floor && t.room_weights.weight(rt) > 0)
        })
        .collect();
    results.push(TestResult {
        name: "db_every_room_furnishable".into(),
        passed: empty_rooms.is_empty(),
        detail: if empty_rooms.is_empty() {
            "every room type has floor objects".into()
        } else {
            format!("no floor objects for {:?}", empty_rooms)
        },
    });

    // Priority types exist and go on the floor
    let bad_priority: Vec<&str> = db
        .priority_types
        .values()
        .flatten()
        .map(String::as_str)
        .filter(|t| !db.object_type(t).is_some_and(|o| o.on_floor))
        .collect();
    results.push(TestResult {
        name: "db_priority_types_on_floor".into(),
        passed: bad_priority.is_empty(),
        detail: if bad_priority.is_empty() {
            "all priority types are floor objects".into()
        } else {
            format!("bad priority types: {}", bad_priority.join(", "))
        },
    });

    // Receptacles have somewhere to put things
    let flat: Vec<&str> = db
        .receptacles
        .keys()
        .filter(|t| {
            db.object_type(t)
                .and_then(|o| o.assets.first())
                .and_then(|a| db.prefab(a))
                .is_some_and(|p| p.placeable_surfaces.is_empty())
        })
        .map(String::as_str)
        .collect();
    results.push(TestResult {
        name: "db_receptacles_have_surfaces".into(),
        passed: flat.is_empty(),
        detail: if flat.is_empty() {
            format!("{} receptacle types", db.receptacles.len())
        } else {
            format!("receptacles without surfaces: {}", flat.join(", "))
        },
    });

    if verbose {
        println!("  Floor object types per room:");
        for rt in RoomType::ALL {
            let n = db
                .object_types
                .values()
                .filter(|t| t.on_floor && t.room_weights.weight(rt) > 0)
                .count();
            println!("    {:10}: {}", format!("{:?}", rt), n);
        }
    }

    results
}

// ── 2. Config ───────────────────────────────────────────────────────────

fn validate_configs(db: &ObjectDatabase) -> Vec<TestResult> {
    println!("--- Generation Config ---");
    let mut results = Vec::new();

    let defaults = validate_config(&GenerationConfig::default());
    results.push(TestResult {
        name: "config_defaults_valid".into(),
        passed: defaults.is_empty(),
        detail: format!("{} problems with defaults", defaults.len()),
    });

    let bad = GenerationConfig {
        p_largest_rectangle: -0.1,
        ..GenerationConfig::default()
    };
    let rejected = matches!(
        HouseGenerator::new(db, bad),
        Err(GenerationError::InvalidConfig(_))
    );
    results.push(TestResult {
        name: "config_bad_probability_rejected".into(),
        passed: rejected,
        detail: "p_largest_rectangle = -0.1 → InvalidConfig".into(),
    });

    results
}

// ── 3. Scene Sweep ──────────────────────────────────────────────────────

/// Generate with `seed`, falling back to derived seeds when the layout
/// cannot be realized.
fn generate_with_retry(
    generator: &HouseGenerator<'_>,
    spec: &RoomSpec,
    request: &SceneRequest,
    seed: u64,
) -> Result<(SceneDocument, u64), GenerationError> {
    let mut derived = StdRng::seed_from_u64(seed);
    let mut attempt_seed = seed;
    let mut last_err = None;
    for attempt in 0..=MAX_SEED_RETRIES {
        match generator.generate(spec, request, attempt_seed) {
            Ok(scene) => return Ok((scene, attempt_seed)),
            Err(e @ (GenerationError::InvalidRoomSpec(_) | GenerationError::InvalidConfig(_))) => return Err(e),
            Err(e) => {
                warn!("seed {} attempt {} failed: {}", seed, attempt, e);
                last_err = Some(e);
                attempt_seed = derived.gen();
            }
        }
    }
    Err(last_err.unwrap_or_else(|| GenerationError::Floorplan(format!("seed {} never ran", seed))))
}

fn sweep_scenes(generator: &HouseGenerator<'_>, args: &Args) -> (Vec<TestResult>, Option<SceneDocument>) {
    println!("--- Scene Sweep ---");
    let mut results = Vec::new();
    let mut first_scene = None;
    let max = generator.config().max_objects_on_receptacle;

    for (name, spec, request) in builtin_specs() {
        let started = Instant::now();
        let mut generated = 0u64;
        let mut failures: Vec<String> = Vec::new();
        let mut warnings = 0usize;
        let (mut floor_objects, mut small_objects) = (0usize, 0usize);

        for i in 0..args.scenes {
            let seed = args.seed.wrapping_add(i);
            let (scene, used) = match generate_with_retry(generator, &spec, &request, seed) {
                Ok(s) => s,
                Err(e) => {
                    failures.push(format!("seed {}: {}", seed, e));
                    continue;
                }
            };
            generated += 1;
            floor_objects += scene.instances_with_role(InstanceRole::FloorObject).count();
            small_objects += scene.instances_with_role(InstanceRole::SmallObject).count();

            for problem in validate_scene(&scene, max) {
                match problem.severity {
                    Severity::Error => {
                        failures.push(format!("seed {} [{}] {}", used, problem.category, problem.message))
                    }
                    Severity::Warning => warnings += 1,
                }
            }
            if first_scene.is_none() {
                first_scene = Some(scene);
            }
        }

        let elapsed = started.elapsed();
        info!("{}: {} scenes in {:.2?}", name, generated, elapsed);
        results.push(TestResult {
            name: format!("sweep_{}", name),
            passed: failures.is_empty(),
            detail: if failures.is_empty() {
                format!(
                    "{} scenes, avg {:.1} floor / {:.1} small objects, {} warnings, {:.2?}",
                    generated,
                    floor_objects as f64 / generated.max(1) as f64,
                    small_objects as f64 / generated.max(1) as f64,
                    warnings,
                    elapsed
                )
            } else {
                format!(
                    "{} problems, first: {}",
                    failures.len(),
                    failures.first().map(String::as_str).unwrap_or("")
                )
            },
        });

        results.push(TestResult {
            name: format!("sweep_{}_furnished", name),
            passed: generated == 0 || floor_objects > 0,
            detail: format!("{} floor objects across {} scenes", floor_objects, generated),
        });
    }

    (results, first_scene)
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(generator: &HouseGenerator<'_>, seed: u64) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    for (name, spec, request) in builtin_specs() {
        let render = || {
            generator
                .generate(&spec, &request, seed)
                .and_then(|s| s.to_json_pretty())
        };
        let (passed, detail) = match (render(), render()) {
            (Ok(a), Ok(b)) => (a == b, format!("{} bytes", a.len())),
            (Err(e), _) | (_, Err(e)) => (true, format!("seed {} not realizable: {}", seed, e)),
        };
        results.push(TestResult {
            name: format!("deterministic_{}", name),
            passed,
            detail,
        });
    }

    results
}

//! Example: Load a USDA file and print its prim hierarchy.
//!
//! Run with: cargo run --example inspect_stage -- scene.usda

use std::env;

use usdio_core::usd::{xform, Stage};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_stage <path-to-usda-file>");
        return;
    }

    let path = &args[1];
    println!("Loading USDA file: {}", path);

    let stage = match Stage::open(path) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("Error loading USDA file: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n=== Stage ===");
    println!("Up axis: {}", stage.up_axis().letter());
    if let Some(mpu) = stage.meters_per_unit() {
        println!("Meters per unit: {}", mpu);
    }
    if let (Some(start), Some(end)) = (stage.start_time_code(), stage.end_time_code()) {
        println!("Time codes: {} - {}", start, end);
    }
    println!("Prims: {}", stage.prim_count());

    println!("\n--- Hierarchy ---");
    for id in stage.traverse() {
        let prim = stage.prim(id);
        let indent = "  ".repeat(prim.path.depth().saturating_sub(1));
        let animated = if xform::transform_might_be_time_varying(prim) {
            " (animated)"
        } else {
            ""
        };
        let type_name = if prim.type_name.is_empty() {
            "-"
        } else {
            prim.type_name.as_str()
        };
        println!("{}{} [{}]{}", indent, prim.name, type_name, animated);
    }
}

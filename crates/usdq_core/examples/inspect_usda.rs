//! Example: Query a USDA file and print the JSON response.
//!
//! Run with: cargo run --example inspect_usda -- assets/desk_setup.usda stats

use std::env;

use anyhow::{bail, Context};

use usdq_core::tools;

fn print_usage() {
    println!("Usage: inspect_usda <path-to-usda-file> [command] [args...]");
    println!("\nCommands:");
    println!("  inspect                            Prim hierarchy (default)");
    println!("  prim <prim-path>                   Attributes and bound material");
    println!("  materials                          Materials and shader parameters");
    println!("  transforms [prim-path]             Local and world matrices");
    println!("  variants                           Variant sets and selections");
    println!("  set-variant <prim> <set> <variant> Select a variant and save the file");
    println!("  export <prim> <output> [stl|obj]   Write a mesh to disk");
    println!("  stats                              Counts and bounds in millimeters");
    println!("\nExamples:");
    println!("  cargo run --example inspect_usda -- assets/desk_setup.usda");
    println!("  cargo run --example inspect_usda -- assets/desk_setup.usda prim /Desk/Table/Top");
    println!("  cargo run --example inspect_usda -- assets/product_configurator.usda variants");
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        print_usage();
        return Ok(());
    };
    let command = args.get(1).map(String::as_str).unwrap_or("inspect");
    let arg = |i: usize, name: &str| {
        args.get(i)
            .map(String::as_str)
            .with_context(|| format!("{} requires <{}>", command, name))
    };

    let response = match command {
        "inspect" => tools::respond(tools::inspect_scene(path)),
        "prim" => tools::respond(tools::get_prim(path, arg(2, "prim-path")?)),
        "materials" => tools::respond(tools::get_materials(path)),
        "transforms" => {
            tools::respond(tools::get_transforms(path, args.get(2).map(String::as_str)))
        }
        "variants" => tools::respond(tools::list_variants(path)),
        "set-variant" => tools::respond(tools::set_variant(
            path,
            arg(2, "prim")?,
            arg(3, "set")?,
            arg(4, "variant")?,
        )),
        "export" => tools::respond(tools::export_mesh(
            path,
            arg(2, "prim")?,
            arg(3, "output")?,
            args.get(4).map(String::as_str).unwrap_or("stl"),
        )),
        "stats" => tools::respond(tools::scene_stats(path)),
        other => {
            print_usage();
            bail!("unknown command: {}", other);
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

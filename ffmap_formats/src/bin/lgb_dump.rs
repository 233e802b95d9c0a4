use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ffmap_formats::{LgbFile, find_level_files};

fn main() -> Result<()> {
    let target = env::args()
        .nth(1)
        .context("usage: lgb_dump <LGB file | level directory> [--json]")?;
    let as_json = env::args().skip(2).any(|arg| arg == "--json");

    let target = PathBuf::from(target);
    let files = if target.is_dir() {
        find_level_files(&target)
    } else {
        vec![target]
    };

    for path in files {
        let lgb = LgbFile::open(&path)?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&lgb)?);
        } else {
            print_summary(&path, &lgb);
        }
    }
    Ok(())
}

fn print_summary(path: &Path, lgb: &LgbFile) {
    println!(
        "{} layers in {} (group '{}')",
        lgb.layers.len(),
        path.display(),
        lgb.group_name
    );
    for layer in &lgb.layers {
        println!(
            "  {id:>6} {name:<40} {count:>6} objects",
            id = layer.layer_id,
            name = layer.name,
            count = layer.objects.len()
        );
        for object in &layer.objects {
            let [x, y, z] = object.transform.translation;
            println!(
                "         {kind:>4} {instance:>10} ({x:>9.2}, {y:>9.2}, {z:>9.2}) {name}",
                kind = object.asset_type.raw(),
                instance = object.instance_id,
                name = object.name
            );
        }
    }
}

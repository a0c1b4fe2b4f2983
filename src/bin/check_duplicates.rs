// src/bin/check_duplicates.rs

use anyhow::Result;
use sensorcsv::{config::CollapseConfig, duplicates::check_dir, init_logging};
use std::env;

fn main() -> Result<()> {
    init_logging("info");

    // usage: check_duplicates [DATA_DIR] [--json]
    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let dir_arg = args.iter().find(|a| !a.starts_with("--")).map(String::as_str);
    let cfg = CollapseConfig::load(dir_arg)?;

    let results = check_dir(&cfg)?;

    if json {
        let reports: Vec<_> = results.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for (path, res) in &results {
        match res {
            Ok(r) => {
                println!("{}: {} headers, {} unnamed", r.file, r.header_count, r.unnamed);
                if r.has_duplicates() {
                    for d in &r.duplicates {
                        println!("  - '{}' appears {} times", d.name, d.count);
                    }
                } else {
                    println!("  no duplicate headers");
                }
                println!("  first headers: {:?}", r.first_headers);
            }
            Err(e) => println!("{}: error: {:#}", path.display(), e),
        }
    }
    Ok(())
}

//! The `bank` command: list repair bank entries

use manifix_core::RepairBank;
use std::path::Path;

/// List bank entries; returns `Ok(true)` unless the file was corrupted.
pub fn run(path: &Path) -> anyhow::Result<bool> {
    let bank = RepairBank::open(path);
    if let Some(error) = bank.load_error() {
        eprintln!("Warning: bank file was corrupted ({error})");
        return Ok(false);
    }

    if bank.is_empty() {
        println!("Bank {} is empty", path.display());
        return Ok(true);
    }

    println!("Bank {} ({} entries)", path.display(), bank.len());
    for entry in bank.iter() {
        println!();
        println!("signature: {}", entry.signature);
        if !entry.signature.context.is_empty() {
            let context: Vec<String> = entry
                .signature
                .context
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            println!("  context: {}", context.join(", "));
        }
        println!("  template ops: {}", entry.template.ops.len());
        println!("  constraints: {}", entry.learned_constraints.len());
        println!(
            "  successes: {} (first used {}, last used {})",
            entry.metadata.success_count,
            entry.metadata.first_used.format("%Y-%m-%d %H:%M:%S"),
            entry.metadata.last_used.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(true)
}

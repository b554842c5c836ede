//! Terminal rendering utilities.

use console::style;
use ctxwarden_context::{BudgetSnapshot, BudgetStatus};
use ctxwarden_core::format_bytes;
use ctxwarden_memory::{Tier, TierStat, TierStats};

/// Budget status, colored by severity.
pub fn status_label(status: BudgetStatus) -> String {
    match status {
        BudgetStatus::Ok => style(status).green().to_string(),
        BudgetStatus::Warning => style(status).yellow().to_string(),
        BudgetStatus::Critical => style(status).red().bold().to_string(),
    }
}

/// Render a budget snapshot as a table.
pub fn print_budget(snapshot: &BudgetSnapshot) {
    let width = snapshot
        .sections
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("section".len());

    println!("{:<width$}  {:>10}", style("section").bold(), style("tokens").bold(), width = width);
    for section in &snapshot.sections {
        println!("{:<width$}  {:>10}", section.name, section.tokens, width = width);
    }
    println!();
    println!("total      {}", snapshot.total);
    println!("reserved   {}", snapshot.reserved);
    println!("used       {}", snapshot.used);
    println!("available  {}", snapshot.available);
    println!(
        "status     {} ({:.1}%)",
        status_label(snapshot.status),
        snapshot.utilization_percent
    );
}

fn tier_line(name: &str, stat: TierStat) {
    println!(
        "{:<10} {:>6} {:>10}",
        name,
        stat.count,
        format_bytes(stat.size_bytes)
    );
}

/// Render per-tier memory statistics.
pub fn print_tier_stats(stats: &TierStats, total_bytes: u64, limit_bytes: u64) {
    println!(
        "{:<10} {:>6} {:>10}",
        style("tier").bold(),
        style("count").bold(),
        style("size").bold()
    );
    for tier in Tier::ALL {
        tier_line(tier.prefix(), stats.get(tier));
    }
    tier_line("untiered", stats.untiered);
    println!();
    println!(
        "{} of {} used",
        format_bytes(total_bytes),
        format_bytes(limit_bytes)
    );
}

//! `inkwell prompts`: the prompt optimizer report.

use super::{build_orchestrator, load_config};

pub async fn run(user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = build_orchestrator(load_config()?, false)?;
    let report = orchestrator.prompt_report(user).await;

    println!("Prompt report for {user}");
    println!("─────────────────────────────────────");
    println!(
        "  Health: {:.2}   Prompts: {} ({} active)",
        report.health_score, report.total_prompts, report.active_prompts
    );
    println!();
    println!("  {:<16} {:>7} {:>6}  status", "prompt", "score", "uses");
    for p in &report.prompts {
        let status = if p.is_active { "active" } else { "archived" };
        println!("  {:<16} {:>7.3} {:>6}  {status}", p.prompt_id, p.score, p.uses);
    }

    if !report.underperformers.is_empty() {
        println!();
        let ids: Vec<&str> = report.underperformers.iter().map(|p| p.prompt_id.as_str()).collect();
        println!("  Underperforming: {}", ids.join(", "));
    }
    for c in &report.specialization_candidates {
        println!(
            "  {} does best on {} ({:.2}) and worst on {} ({:.2})",
            c.prompt_id, c.best_signature, c.best_score, c.worst_signature, c.worst_score
        );
    }
    if !report.coverage_gaps.is_empty() {
        println!("  No prompt covers: {}", report.coverage_gaps.join(", "));
    }
    Ok(())
}

//! `inkwell stats`: memory statistics for one user.

use super::{build_orchestrator, load_config};

pub async fn run(user: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let backend = config.memory.backend.clone();
    let orchestrator = build_orchestrator(config, false)?;
    let stats = orchestrator.statistics(user).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Memory statistics for {user}");
    println!("─────────────────────────────────────");
    println!("  Backend:            {backend}");
    println!("  Reasoning chains:   {}", stats.total_reasoning_chains);
    println!("  Tool executions:    {}", stats.total_tool_executions);
    println!("  Avg reasoning time: {:.1} ms", stats.avg_reasoning_time_ms);
    println!("  Avg execution time: {:.1} ms", stats.avg_execution_time_ms);
    println!("  Success rate:       {:.1}%", stats.overall_success_rate * 100.0);
    println!("  Cached patterns:    {}", stats.cached_patterns);
    println!("  Storage:            {:.1} KB", stats.storage_bytes as f64 / 1024.0);

    if !stats.most_used_capabilities.is_empty() {
        println!();
        println!("  Most used:");
        for (name, uses) in &stats.most_used_capabilities {
            println!("    {name:<14} {uses}");
        }
    }
    Ok(())
}

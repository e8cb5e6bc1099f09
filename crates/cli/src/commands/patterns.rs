//! `inkwell patterns`: detected usage and error patterns.

use super::{build_orchestrator, load_config};

pub async fn run(
    user: &str,
    errors: bool,
    days: i64,
    like: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = build_orchestrator(load_config()?, false)?;

    if errors {
        let patterns = orchestrator.error_patterns(user, days).await;
        if patterns.is_empty() {
            println!("No error patterns in the last {days} days.");
            return Ok(());
        }
        println!("Error patterns for {user} (last {days} days)");
        println!("─────────────────────────────────────");
        for p in &patterns {
            println!(
                "  [{:?}] {}: {} occurrences in {}",
                p.severity,
                p.error_type.as_str(),
                p.frequency,
                p.capabilities_involved.join(", ")
            );
            println!("      fix: {}", p.suggested_fix);
            if let Some(sample) = p.sample_error_messages.first() {
                println!("      e.g. {sample}");
            }
        }
        return Ok(());
    }

    let patterns = orchestrator.usage_patterns(user, days).await;
    if let Some(query) = like {
        // similarity search runs over the patterns cached by the detection above
        let similar = orchestrator.similar_patterns(user, query).await;
        if similar.is_empty() {
            println!("No patterns resemble \"{query}\".");
        }
        for s in &similar {
            println!("  {:.2}  {}", s.similarity, s.pattern.summary());
        }
        return Ok(());
    }

    if patterns.is_empty() {
        println!("Not enough activity in the last {days} days to detect patterns.");
        return Ok(());
    }
    println!("Usage patterns for {user} (last {days} days)");
    println!("─────────────────────────────────────");
    for p in &patterns {
        println!("  conf {:.2}  {}", p.confidence, p.summary());
    }
    Ok(())
}

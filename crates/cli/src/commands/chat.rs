//! `inkwell chat`: interactive or single-message coaching.
//!
//! In interactive mode two slash commands are available:
//! `/rate <1-5>` scores the last reply and `/profile <level> <phase>`
//! updates the user's profile.

use super::{build_orchestrator, load_config};
use inkwell_agent::Orchestrator;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(user: &str, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set INKWELL_API_KEY (or OPENAI_API_KEY), or add it to:");
        eprintln!("    {}", inkwell_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }
    let model = config.provider.model.clone();
    let orchestrator = build_orchestrator(config, true)?;

    if let Some(msg) = message {
        let reply = orchestrator.handle(user, &msg).await;
        println!("{reply}");
        return Ok(());
    }

    println!();
    println!("  Inkwell essay coach ({model}) for {user}");
    println!("  Type 'exit' to quit, '/rate 1-5' to score a reply, '/profile <level> <phase>' to set your profile.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "exit" | "quit" => break,
            _ if line.starts_with('/') => slash_command(&orchestrator, user, line).await,
            _ => {
                let reply = orchestrator.handle(user, line).await;
                println!();
                for text in reply.lines() {
                    println!("  Inkwell > {text}");
                }
                println!();
            }
        }
        prompt()?;
    }

    if let Some(metrics) = orchestrator.session_metrics(user).await {
        println!();
        println!(
            "  {} turns, {:.0} ms average response",
            metrics.interaction_count, metrics.avg_response_time_ms
        );
    }
    println!("  Good luck with the essay!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn slash_command(orchestrator: &Orchestrator, user: &str, line: &str) {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("/rate") => match parts.next().and_then(|s| s.parse::<u8>().ok()) {
            Some(score) => match orchestrator.record_feedback(user, score).await {
                Ok(true) => println!("  Thanks, noted."),
                Ok(false) => println!("  Nothing to rate yet."),
                Err(e) => eprintln!("  [Error] {e}"),
            },
            None => println!("  Usage: /rate <1-5>"),
        },
        Some("/profile") => {
            let mut profile = orchestrator.profile(user).await;
            profile.experience_level = parts.next().map(str::to_string).or(profile.experience_level);
            profile.essay_phase = parts.next().map(str::to_string).or(profile.essay_phase);
            if let Err(e) = orchestrator.update_profile(user, profile).await {
                eprintln!("  [Error] {e}");
            } else {
                println!("  Profile updated.");
            }
        }
        _ => println!("  Unknown command. Try /rate or /profile."),
    }
}

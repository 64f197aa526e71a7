//! Chat entry points: one-shot `--query` and the interactive REPL.

use anyhow::Result;
use console::Style;

use super::Context;
use super::repl::Repl;
use crate::setup;

/// Answer a single question and exit.
pub async fn run_once(query: &str, ctx: &Context) -> Result<()> {
    let mut agent = setup::agent(&ctx.config)?;

    if ctx.verbose {
        let dim = Style::new().dim();
        println!(
            "{}",
            dim.apply_to(format!("Model: {}", agent.config().model))
        );
    }

    println!("User: {}", query);
    let answer = agent.run(query).await;
    println!("Agent: {}", answer);
    Ok(())
}

/// Start the interactive session.
pub async fn run_repl(ctx: &Context) -> Result<()> {
    let agent = setup::agent(&ctx.config)?;
    let mut repl = Repl::new(agent, ctx.verbose)?;
    repl.run().await
}

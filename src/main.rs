//! ReAgent 命令行入口
//!
//! 初始化日志、加载配置、装配 Agent，从终端逐个读取问题运行 ReAct 循环。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use reagent::{
    agent::create_agent,
    config::load_config,
    observability,
    react::{ReactEvent, RunOutcome, StdinChannel},
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "reagent", about = "ReAct agent: reason, act with tools, observe", version)]
struct Cli {
    /// Extra configuration file (overrides config/default.toml)
    #[arg(short, long, env = "REAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print model output, tool calls and observations to stderr
    #[arg(long)]
    show_system_messages: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init(cli.verbose);

    let mut cfg = load_config(cli.config).context("Failed to load configuration")?;
    if cli.show_system_messages {
        cfg.agent.show_system_messages = true;
    }

    let mut agent = create_agent(&cfg).context("Failed to create agent")?;
    if cfg.agent.show_system_messages {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReactEvent>();
        agent = agent.with_event_tx(tx);
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                eprintln!("[system] {}", ev.summary());
            }
        });
    }

    println!("=== ReAct agent started (type exit or quit to leave) ===");
    let mut channel = StdinChannel::new();
    let outcome = agent.run(&mut channel).await.context("Agent loop failed")?;

    match outcome {
        RunOutcome::Done { interactions } => {
            println!("Session ended after {} interaction(s).", interactions);
        }
        RunOutcome::StepBudgetExhausted { steps, interactions } => {
            println!(
                "Task incomplete: stopped after {} steps without a final answer ({} interaction(s) completed).",
                steps, interactions
            );
        }
    }
    Ok(())
}

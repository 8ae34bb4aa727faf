//! Brief - 多阶段 ReAct 简报智能体
//!
//! 入口：初始化日志、加载配置、构建编排器，运行一次 计划 -> 执行 -> 评审 -> 综合，
//! 报告写到 stdout，日志写到 stderr，退出码见 exit_codes。

use std::path::PathBuf;

use anyhow::Context;
use brief::config::load_config;
use brief::core::{AgentError, Credentials, OrchestratorBuilder, RunStage, ToolContext};
use brief::exit_codes;
use brief::react::RunEvent;
use brief::tools::weather::parse_coords;
use brief::tools::COORDS_KEY;
use brief::{observability, report};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "brief",
    version,
    about = "Plan, research and critique a goal, then write an executive brief"
)]
struct Cli {
    /// 用户目标（多个词会以空格拼接）
    #[arg(required = true, num_args = 1..)]
    goal: Vec<String>,

    /// 天气查询坐标，格式 LAT,LON
    #[arg(long, value_name = "LAT,LON")]
    coords: Option<String>,

    /// 额外的运行上下文，可重复
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    context: Vec<(String, String)>,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 单步 THINKING 次数上限
    #[arg(long, value_name = "N")]
    max_iterations: Option<usize>,

    /// 把运行轨迹 JSON 写入文件
    #[arg(long, value_name = "PATH")]
    trace_out: Option<PathBuf>,

    /// stdout 输出轨迹 JSON 而不是文本报告
    #[arg(long)]
    json: bool,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() {
    observability::init();
    let code = match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let goal = cli.goal.join(" ");

    let mut context: ToolContext = cli.context.into_iter().collect();
    if let Some(coords) = cli.coords {
        parse_coords(&coords).context("invalid --coords")?;
        context.insert(COORDS_KEY.to_string(), coords.trim().to_string());
    }

    let mut cfg = load_config(cli.config).context("Failed to load config")?;
    if let Some(n) = cli.max_iterations {
        cfg.react.max_iterations = n;
    }
    let orchestrator = OrchestratorBuilder::new(cfg)
        .with_credentials(Credentials::from_env())
        .build();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, cancelling run");
                cancel.cancel();
            }
        });
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let progress = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            match serde_json::to_string(&ev) {
                Ok(line) => tracing::info!(target: "brief::progress", "{}", line),
                Err(e) => tracing::debug!(error = %e, "unserializable event"),
            }
        }
    });

    let outcome = orchestrator.run(&goal, context, &cancel, Some(&event_tx)).await;
    drop(event_tx);
    let _ = progress.await;

    let trace = match &outcome {
        Ok(trace) => trace,
        Err(failure) => &failure.trace,
    };
    if let Some(path) = &cli.trace_out {
        let json = trace.to_json().context("Failed to serialize trace")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        tracing::info!(path = %path.display(), "trace written");
    }

    match outcome {
        Ok(trace) => {
            if cli.json {
                println!("{}", trace.to_json().context("Failed to serialize trace")?);
            } else {
                print!("{}", report::render_trace(&trace));
            }
            Ok(exit_codes::OK)
        }
        Err(failure) => {
            if cli.json {
                println!("{}", failure.trace.to_json().context("Failed to serialize trace")?);
            } else {
                print!("{}", report::render_failure(&failure));
            }
            eprintln!("{}", failure);
            let code = match (&failure.error, failure.stage) {
                (AgentError::Cancelled, _) => exit_codes::CANCELLED,
                (_, RunStage::Planning) => exit_codes::PLANNING_FAILURE,
                (_, RunStage::Synthesis) => exit_codes::SYNTHESIS_FAILURE,
                _ => exit_codes::INVALID,
            };
            Ok(code)
        }
    }
}

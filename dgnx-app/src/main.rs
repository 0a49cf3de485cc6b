use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use dgnx_config::{AppConfig, ConfigError};
use dgnx_core::document::Entity;
use dgnx_io::{ExplodeRun, JsonFacade, ReportSaver, ScriptLoader, explode_all};

mod demo;

#[derive(Parser)]
#[command(name = "dgnx", about = "把 DGN 图元脚本炸开为 DXF/DWG 实体")]
struct Cli {
    /// 图元脚本（JSON）
    #[arg(required_unless_present = "demo")]
    script: Option<PathBuf>,

    /// 配置文件路径，缺省时自动发现
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 使用内建演示脚本
    #[arg(long, conflicts_with = "script")]
    demo: bool,

    /// 写出 JSON 报告
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!("启动 dgnx");

    if let Err(err) = run(&cli, &config) {
        error!("炸开失败: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let facade = JsonFacade::new();
    let set = match &cli.script {
        Some(path) => facade
            .load(path)
            .with_context(|| format!("无法读取图元脚本 {}", path.display()))?,
        None => {
            info!("使用内建演示脚本");
            demo::element_set()
        }
    };

    let run = explode_all(&set, &config.explode);
    print_summary(&run);

    if let Some(output) = &cli.output {
        save_report(&facade, &run, output)?;
    }
    Ok(())
}

fn save_report(facade: &JsonFacade, run: &ExplodeRun, path: &Path) -> Result<()> {
    facade
        .save(&run.report(), path)
        .with_context(|| format!("无法写出报告 {}", path.display()))?;
    info!(path = %path.display(), "报告已写出");
    Ok(())
}

fn print_summary(run: &ExplodeRun) {
    let report = run.report();
    let summary = &report.summary;
    println!(
        "图元 {} 个：成功 {}，失败 {}",
        summary.elements, summary.exploded, summary.failed
    );
    println!("实体 {} 个", summary.entities);
    for (kind, count) in &summary.by_kind {
        println!("  {kind}: {count}");
    }
    for (_, entity) in run.document.entities() {
        match entity {
            Entity::Text(text) => println!("  文字: {}", text.content),
            Entity::MText(mtext) => println!("  文字: {}", mtext.plain_text()),
            _ => {}
        }
    }
    for outcome in run.outcomes.iter().filter(|outcome| !outcome.is_exploded()) {
        println!(
            "  失败: {} ({})",
            outcome.name.as_deref().unwrap_or("<未命名>"),
            outcome.error.as_deref().unwrap_or_default()
        );
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

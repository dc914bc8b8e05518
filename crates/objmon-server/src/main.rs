use anyhow::Result;
use objmon_common::clock::SystemClock;
use objmon_common::types::Role;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use objmon_server::app::App;
use objmon_server::config::ServerConfig;
use objmon_server::rule_seed::{self, RulesSeedFile};
use objmon_server::scheduler::RuleExecutionScheduler;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  objmon-server [config.toml]                               Start the rule scheduler");
    eprintln!("  objmon-server init-rules <config.toml> <seed.json>        Create custom alert rules from seed file");
    eprintln!("  objmon-server test-rule <config.toml> <rule-id> [user]    Dry-run a rule and record the result");
    eprintln!("  objmon-server activate <config.toml> <rule-id>            Activate a tested rule");
    eprintln!("  objmon-server deactivate <config.toml> <rule-id>          Deactivate a rule");
    eprintln!("  objmon-server run-once <config.toml> [trainer|gym]        Run active rules once and print new alerts");
}

fn required<'a>(args: &'a [String], idx: usize, what: &str) -> Result<&'a str> {
    args.get(idx).map(String::as_str).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("missing {what} argument")
    })
}

fn open_app(config_path: &str) -> Result<App> {
    let config = ServerConfig::load(config_path)?;
    App::open(&config, Arc::new(SystemClock))
}

#[tokio::main]
async fn main() -> Result<()> {
    objmon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("objmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-rules") => {
            let config_path = required(&args, 2, "<config.toml>")?;
            let seed_path = required(&args, 3, "<seed.json>")?;
            run_init_rules(config_path, seed_path)
        }
        Some("test-rule") => {
            let config_path = required(&args, 2, "<config.toml>")?;
            let rule_id = required(&args, 3, "<rule-id>")?;
            let tested_by = args.get(4).map(String::as_str).unwrap_or("cli");
            run_test_rule(config_path, rule_id, tested_by)
        }
        Some(cmd @ ("activate" | "deactivate")) => {
            let config_path = required(&args, 2, "<config.toml>")?;
            let rule_id = required(&args, 3, "<rule-id>")?;
            run_set_active(config_path, rule_id, cmd == "activate")
        }
        Some("run-once") => {
            let config_path = required(&args, 2, "<config.toml>")?;
            let role = args
                .get(3)
                .map(|r| r.parse::<Role>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            run_once(config_path, role)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn run_init_rules(config_path: &str, seed_path: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let seed = RulesSeedFile::load(seed_path)?;
    let report = rule_seed::init_rules(&app.rules, seed)?;
    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        failed = report.failed,
        "Seed import complete"
    );
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_test_rule(config_path: &str, rule_id: &str, tested_by: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let result = app.rules.test_by_id(rule_id, tested_by, tested_by)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_set_active(config_path: &str, rule_id: &str, active: bool) -> Result<()> {
    let app = open_app(config_path)?;
    let rule = if active {
        app.rules.activate(rule_id)?
    } else {
        app.rules.deactivate(rule_id)?
    };
    tracing::info!(rule_id = %rule.id, name = %rule.name, active = rule.active, "Rule state changed");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_once(config_path: &str, role: Option<Role>) -> Result<()> {
    let app = open_app(config_path)?;
    let alerts = app.engine.run_active_rules(role)?;
    println!("{}", serde_json::to_string_pretty(&alerts)?);
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        data_dir = %config.data_dir,
        objectives_file = %config.objectives_file,
        locale = %config.locale,
        "objmon-server starting"
    );

    let app = App::open(&config, Arc::new(SystemClock))?;

    if !config.execution.enabled {
        tracing::info!("Custom alert rule scheduler disabled");
        signal::ctrl_c().await.ok();
        tracing::info!("Server stopped");
        return Ok(());
    }

    let scheduler = RuleExecutionScheduler::new(Arc::new(app.engine), config.execution.tick_secs);
    let handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");
    handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}

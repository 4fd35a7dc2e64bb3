use clap::Parser;
use component_etl::domain::ports::ConfigProvider;
use component_etl::utils::error::{EtlError, ErrorSeverity};
use component_etl::utils::{logger, validation::Validate};
use component_etl::{
    CliConfig, HttpTransformer, LocalStorage, Orchestrator, OrchestratorOptions, RawRuleConfig,
    RuleRegistry,
};
use std::sync::Arc;

fn exit_code_for(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(exit_code_for(e).max(1));
}

fn print_summary(summary: &serde_json::Value, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
    } else {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("🚀 Starting component-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let raw_rules = match RawRuleConfig::from_file(&config.config) {
        Ok(raw) => raw,
        Err(e) => fail(&e),
    };
    let registry = RuleRegistry::partition(&raw_rules);
    tracing::info!(
        "📋 Loaded {} target rule(s) from {}",
        registry.len(),
        config.config.display()
    );

    let transformer = HttpTransformer::from_env(
        &config.api_key_env,
        config.endpoint.clone(),
        config.model.clone(),
        config.max_tokens,
    );

    if !config.dry_run && !transformer.has_api_key() {
        tracing::warn!(
            "🔑 {} is not set, transform requests will fail",
            config.api_key_env
        );
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(transformer),
        Arc::new(LocalStorage::default()),
        OrchestratorOptions::from_provider(&config),
    )
    .with_monitoring(config.monitor);

    if config.dry_run {
        let plan = match orchestrator
            .plan(
                config.base_path(),
                config.output_path(),
                config.requested_targets(),
            )
            .await
        {
            Ok(plan) => plan,
            Err(e) => fail(&e),
        };

        tracing::info!("🧪 Dry run: {} job(s) planned, nothing written", plan.jobs.len());
        print_summary(&plan.summary(), config.json)?;

        if !plan.target_failures.is_empty() || !plan.rejected.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let result = match orchestrator
        .run(
            config.base_path(),
            config.output_path(),
            config.requested_targets(),
        )
        .await
    {
        Ok(result) => result,
        Err(e) => fail(&e),
    };

    print_summary(&result.summary(), config.json)?;

    if result.is_success() {
        tracing::info!("✅ All {} job(s) completed successfully!", result.succeeded);
        if !config.json {
            println!("📁 Output saved to: {}", config.out.display());
        }
        Ok(())
    } else {
        tracing::error!(
            "❌ {} job(s) failed, {} target(s) skipped",
            result.failed(),
            result.target_failures.len()
        );
        std::process::exit(1);
    }
}

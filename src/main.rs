use clap::Parser;
use recipe_calendar::utils::error::ErrorCategory;
use recipe_calendar::utils::{logger, validation::Validate};
use recipe_calendar::{web, AppError, CliConfig};

fn exit_code(e: &AppError) -> i32 {
    match e.category() {
        ErrorCategory::Configuration => 1,
        ErrorCategory::Internal => 3,
        _ => 2,
    }
}

fn fail(e: &AppError) -> ! {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 載入配置
    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(exit_code(&e));
        }
    };

    logger::init_logger(config.log_format(), cli.verbose, config.log_level());
    tracing::info!("Starting recipe-calendar");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(&e);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");

    if cli.check {
        println!("✅ Configuration '{}' is valid", cli.config);
        return;
    }

    if let Err(e) = web::run(config).await {
        fail(&e);
    }
}

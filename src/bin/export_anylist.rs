use clap::Parser;
use recipe_calendar::adapters::{AnyListClient, CredentialVault, NodeBridge};
use recipe_calendar::core::import;
use recipe_calendar::domain::ports::AnyListCredentials;
use recipe_calendar::utils::logger;
use recipe_calendar::{AppError, Result};
use std::io::{BufRead, Write};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "export-anylist")]
#[command(about = "Export every AnyList recipe into the default recipes file")]
struct Args {
    /// Output file for the default recipes
    #[arg(short, long, default_value = "data/default_recipes.json")]
    output: String,

    /// AnyList account email; prompted for when missing
    #[arg(long)]
    email: Option<String>,

    /// Use the credentials saved for this app user instead of prompting
    #[arg(long)]
    user: Option<String>,

    #[arg(long, default_value = "data/anylist_creds.json")]
    credentials_path: String,

    #[arg(long, default_value = "data/.encryption_key")]
    key_path: String,

    #[arg(long, default_value = "node")]
    node: String,

    #[arg(long, default_value = "bridge/anylist_bridge.js")]
    bridge_script: String,

    /// Bridge timeout in seconds; large libraries take a while
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Stop after this many recipes
    #[arg(long)]
    max: Option<usize>,

    #[arg(short, long)]
    verbose: bool,
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn resolve_credentials(args: &Args) -> Result<AnyListCredentials> {
    if let Some(user) = &args.user {
        let vault = CredentialVault::open(&args.credentials_path, &args.key_path)?;
        if let Some(creds) = vault.get(user)? {
            println!("Found saved credentials for: {}", user);
            return Ok(creds);
        }
        tracing::warn!("No saved AnyList credentials for {}", user);
    }

    println!("AnyList Credentials Required");
    let email = match &args.email {
        Some(email) => email.clone(),
        None => prompt("AnyList email")?,
    };
    let password = prompt("AnyList password")?;
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::ValidationError {
            message: "Email and password are required".to_string(),
        });
    }
    Ok(AnyListCredentials {
        email: email.trim().to_string(),
        password,
    })
}

async fn export(args: &Args) -> Result<()> {
    let creds = resolve_credentials(args)?;
    println!("Using AnyList account: {}", creds.email);

    let bridge = NodeBridge::new(
        args.node.clone(),
        args.bridge_script.clone(),
        Duration::from_secs(args.timeout),
    );
    let client = AnyListClient::new(bridge, true);

    let (recipes, summary) = import::sync_from_provider(&client, &creds, args.max).await?;
    if recipes.is_empty() {
        return Err(AppError::ValidationError {
            message: "No recipes found after filtering".to_string(),
        });
    }

    if let Some(parent) = std::path::Path::new(&args.output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    import::write_default_recipes(&args.output, &recipes, &summary, &creds.email)?;

    println!("✅ {}", summary.describe());
    println!("📁 Output saved to: {}", args.output);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose, None);

    if let Err(e) = export(&args).await {
        tracing::error!("❌ Export failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

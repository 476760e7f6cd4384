mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use jfp_core::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "jellyfed=info,jfp_server=info,jfp_core=info,jfp_db=info,tower_http=info".to_string());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&env_filter)).init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve())
        }
        Commands::HashPassword { password } => hash_password(&password),
        Commands::GenerateSecret { bytes } => generate_secret(bytes),
        Commands::ValidateConfig => validate_config(),
        Commands::Version => {
            println!("jellyfed {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    tracing::info!(listen_address = %config.server.listen_address, "starting jellyfed");
    jfp_server::start(config).await?;
    Ok(())
}

fn hash_password(password: &str) -> Result<(), Box<dyn std::error::Error>> {
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    println!("{hash}");
    Ok(())
}

fn generate_secret(bytes: usize) -> Result<(), Box<dyn std::error::Error>> {
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(buf.as_mut_slice());
    let hex_str: String = buf.iter().map(|b| format!("{b:02x}")).collect();
    println!("{hex_str}");
    Ok(())
}

fn validate_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let warnings = config.validate();

    if warnings.is_empty() {
        println!("Configuration is valid");
    } else {
        for w in &warnings {
            println!("  Warning: {w}");
        }
    }

    println!("  Listen address: {}", config.server.listen_address);
    println!("  Server id: {}", config.server.server_id);
    println!("  Database: {}", config.server.db_path);
    println!(
        "  External URL: {}",
        config.server.external_url.as_deref().unwrap_or("(unset)")
    );
    println!("  Direct stream: {}", config.streaming.direct_stream);
    println!(
        "  Session idle TTL: {}",
        config
            .session
            .idle_ttl
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "disabled".to_string())
    );

    Ok(())
}

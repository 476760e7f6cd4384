use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jellyfed")]
#[command(author, version, about = "Federation reverse proxy for multiple Jellyfin servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server (default if no subcommand is given)
    Serve,

    /// Generate a bcrypt password hash for seeding an admin account
    HashPassword {
        /// Password to hash
        password: String,
    },

    /// Generate a random hex secret, useful for API keys or signing material
    GenerateSecret {
        /// Number of random bytes before hex encoding
        #[arg(long, default_value = "32")]
        bytes: usize,
    },

    /// Validate configuration loaded from the environment and print warnings
    ValidateConfig,

    /// Print version information
    Version,
}

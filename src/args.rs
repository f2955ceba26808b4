use clap::Parser;

#[derive(Parser)]
#[command(about = "Game server stats collector for BF2:MC Online")]
pub struct Args {
    /// Path to the JSON config file.
    #[arg(long, default_value = "config.json")]
    pub config: String,
    /// Route outbound API requests through this proxy.
    #[arg(long)]
    pub proxy: Option<String>,
    #[arg(long)]
    pub clickhouse_server: Option<String>,
    #[arg(long)]
    pub clickhouse_database: Option<String>,
    #[arg(long)]
    pub clickhouse_user: Option<String>,
    #[arg(long)]
    pub clickhouse_password: Option<String>,
}

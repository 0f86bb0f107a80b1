use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    txsage_cli::cli::cli().await
}

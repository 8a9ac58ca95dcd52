#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = akada_rust::run_worker().await {
        eprintln!("akada-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

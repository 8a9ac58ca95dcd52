#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = akada_rust::run().await {
        eprintln!("akada-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = caderno_rust::run().await {
        eprintln!("caderno-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

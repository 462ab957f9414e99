#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = caderno_rust::run_seed().await {
        eprintln!("caderno-seed fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

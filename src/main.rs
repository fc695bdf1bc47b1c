#[tokio::main]
async fn main() {
    // Optional .env for local overrides; absence is fine.
    let _ = dotenvy::dotenv();

    if let Err(err) = brewflow::cli::run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

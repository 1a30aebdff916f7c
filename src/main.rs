#[tokio::main]
async fn main() {
    if let Err(error) = chronovoice_lib::run().await {
        eprintln!("chronovoice error: {error:#}");
        std::process::exit(1);
    }
}

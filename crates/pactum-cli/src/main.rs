#[tokio::main]
async fn main() {
    let code = pactum_cli::run().await;
    if code != 0 {
        std::process::exit(code);
    }
}

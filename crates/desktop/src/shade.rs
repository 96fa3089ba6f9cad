#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = shade::run_entry(true).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

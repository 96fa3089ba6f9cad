#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = shade::run_worker_entry().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

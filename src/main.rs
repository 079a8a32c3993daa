#[tokio::main]
async fn main() {
    airmed_lib::init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = airmed_lib::run(&args).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

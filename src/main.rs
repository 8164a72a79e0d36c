//! Entry point for the registry-mirror binary

use registry_mirror::cli::{Args, Runner};

#[tokio::main]
async fn main() {
    let runner = Runner::new(Args::from_env());

    if let Err(e) = runner.run().await {
        runner.logger().error(&e.to_string());
        std::process::exit(1);
    }
}

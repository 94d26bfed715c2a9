//! Binary entry point for the match server.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_rps::init().await
}

// src/main.rs
#[tokio::main]
async fn main() -> Result<(), poll_backend::BoxError> {
    poll_backend::start_server().await
}

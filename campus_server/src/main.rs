#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campus_server::start_server().await
}

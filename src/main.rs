#[tokio::main]
async fn main() -> anyhow::Result<()> {
    capture_configurator_lib::run().await
}

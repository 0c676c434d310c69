#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcpanel_lib::run().await
}

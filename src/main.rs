#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quill::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    immersion_study_lib::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sheet_task_manager_lib::run().await
}

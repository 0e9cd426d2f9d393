//! Atlas world server binary entry point.

use lib_atlas::{Application, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}

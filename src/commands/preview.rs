use crate::commands::display::PreviewDisplay;
use crate::pdf::Rasterizer;
use crate::session::Session;
use crate::workflow::preview;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    pages: &str,
    output_dir: Q,
    rasterizer: Arc<dyn Rasterizer>,
) -> Result<()> {
    let request = Session::new()
        .with_input(input.as_ref())
        .with_expression(pages)
        .preview_request()?;

    let mut display = PreviewDisplay::new(output_dir.as_ref())?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = preview::spawn(request, rasterizer, tx);

    while let Some(event) = rx.recv().await {
        if let Some(outcome) = display.handle(event) {
            worker.await?;
            outcome?;
            return Ok(());
        }
    }

    let err = display.abandon();
    worker.await?;
    Err(err.into())
}

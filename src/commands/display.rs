use crate::error::{Error, Result};
use crate::workflow::preview::{PreviewEvent, PreviewPage, PreviewSummary};
use anyhow::Context;
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// A "rendering..." notice on stderr that is taken down exactly once.
#[derive(Debug)]
pub struct ProgressIndicator {
    label: String,
    dismissed: bool,
}

impl ProgressIndicator {
    pub fn show(label: impl Into<String>) -> Self {
        let label = label.into();
        eprintln!("{}...", label);
        Self {
            label,
            dismissed: false,
        }
    }

    /// Take the indicator down. Returns `false` if it was already gone.
    pub fn dismiss(&mut self) -> bool {
        if self.dismissed {
            return false;
        }
        self.dismissed = true;
        eprintln!("{}: done", self.label);
        true
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.dismiss();
    }
}

/// File name used for a previewed page inside the preview directory.
pub fn page_file_name(page: u32) -> String {
    format!("page-{:04}.png", page)
}

/// Write one previewed page as a PNG, returning where it went.
pub fn save_page(dir: &Path, page: u32, image: &RgbaImage) -> std::result::Result<PathBuf, String> {
    let path = dir.join(page_file_name(page));
    image
        .save(&path)
        .map_err(|e| format!("unable to save {}: {}", path.display(), e))?;
    Ok(path)
}

/// Shows preview events on the terminal, one at a time, as they arrive.
#[derive(Debug)]
pub struct PreviewDisplay {
    dir: PathBuf,
    progress: Option<ProgressIndicator>,
    // Pages actually written, which a failed save makes differ from the worker's count.
    tally: PreviewSummary,
}

impl PreviewDisplay {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            progress: None,
            tally: PreviewSummary::default(),
        })
    }

    /// Show one event. Returns the outcome once the preview is over.
    pub fn handle(&mut self, event: PreviewEvent) -> Option<Result<PreviewSummary>> {
        match event {
            PreviewEvent::Started {
                first_page,
                last_page,
                pages,
            } => {
                self.tally = PreviewSummary::default();
                self.progress = Some(ProgressIndicator::show(format!(
                    "Rendering {} page(s) from {}-{}",
                    pages, first_page, last_page
                )));
                None
            }
            PreviewEvent::SlowWarning { pages } => {
                println!("Warning: previewing {} pages may take a while", pages);
                None
            }
            PreviewEvent::Page(PreviewPage { page, image }) => {
                match image.and_then(|image| {
                    let path = save_page(&self.dir, page, &image)?;
                    Ok((image.width(), image.height(), path))
                }) {
                    Ok((width, height, path)) => {
                        self.tally.rendered += 1;
                        println!("Page {}: {}x{} -> {}", page, width, height, path.display())
                    }
                    Err(message) => {
                        self.tally.failed += 1;
                        println!("Page {}: Error: {}", page, message)
                    }
                }
                None
            }
            PreviewEvent::Finished(_) => {
                self.dismiss_progress();
                let summary = self.tally;
                if summary.failed > 0 {
                    println!(
                        "Previewed {} page(s), {} failed, in {}",
                        summary.rendered,
                        summary.failed,
                        self.dir.display()
                    );
                } else {
                    println!(
                        "Previewed {} page(s) in {}",
                        summary.rendered,
                        self.dir.display()
                    );
                }
                Some(Ok(summary))
            }
            PreviewEvent::Failed(e) => {
                self.dismiss_progress();
                println!("Error: {}", e);
                Some(Err(e))
            }
        }
    }

    /// The worker went away without a final event.
    pub fn abandon(&mut self) -> Error {
        self.dismiss_progress();
        Error::Render("preview worker stopped unexpectedly".to_string())
    }

    /// Whether a progress indicator is currently up.
    pub fn in_progress(&self) -> bool {
        self.progress.is_some()
    }

    fn dismiss_progress(&mut self) {
        if let Some(mut progress) = self.progress.take() {
            progress.dismiss();
        }
    }
}

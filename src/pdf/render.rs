use crate::error::{Error, Result};
use image::RgbaImage;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// A rendered page, or the reason that one page could not be rendered.
pub type PageImage = std::result::Result<RgbaImage, String>;

/// One page of a rasterized range. The bitmap is only decoded by [`RenderedPage::decode`];
/// dropping the page skips that work.
pub struct RenderedPage(Box<dyn FnOnce() -> PageImage + Send>);

impl RenderedPage {
    /// A page whose outcome is already known.
    pub fn ready(image: PageImage) -> Self {
        Self(Box::new(move || image))
    }

    pub fn from_fn(decode: impl FnOnce() -> PageImage + Send + 'static) -> Self {
        Self(Box::new(decode))
    }

    pub fn decode(self) -> PageImage {
        (self.0)()
    }
}

impl fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPage").finish_non_exhaustive()
    }
}

/// Turns a contiguous run of PDF pages into bitmaps.
pub trait Rasterizer: Send + Sync + fmt::Debug {
    /// Render the 1-based pages `first_page..=last_page`.
    ///
    /// Returns exactly one entry per page of the range, in ascending order.
    /// An `Err` for the whole call means nothing could be rendered at all.
    fn rasterize(&self, path: &Path, first_page: u32, last_page: u32) -> Result<Vec<RenderedPage>>;
}

/// The options that should be applied when rendering a page.
#[derive(Debug, Copy, Clone)]
pub struct RenderOptions {
    /// Output resolution in dots per inch; 72 renders one pixel per point.
    pub dpi: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { dpi: 72 }
    }
}

/// Renders pages by running poppler's `pdftoppm` in a scratch directory.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    binary: PathBuf,
    options: RenderOptions,
}

impl Pdftoppm {
    pub fn new(binary: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            binary: binary.into(),
            options,
        }
    }
}

impl Rasterizer for Pdftoppm {
    fn rasterize(&self, path: &Path, first_page: u32, last_page: u32) -> Result<Vec<RenderedPage>> {
        let dir = tempfile::Builder::new()
            .prefix("pdfslice")
            .tempdir()
            .map_err(|e| Error::Render(format!("failed to create scratch directory: {}", e)))?;

        debug!(
            binary = %self.binary.display(),
            first_page,
            last_page,
            dpi = self.options.dpi,
            "running renderer"
        );

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(self.options.dpi.to_string())
            .arg("-f")
            .arg(first_page.to_string())
            .arg("-l")
            .arg(last_page.to_string())
            .arg(path)
            .arg(dir.path().join("page"))
            .output()
            .map_err(|e| {
                Error::Render(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        let mut rendered = collect_output(dir.path())?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            if rendered.is_empty() {
                return Err(Error::Render(format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    output.status,
                    stderr
                )));
            }
            warn!(status = %output.status, %stderr, "renderer finished with errors");
        }

        // The scratch directory goes away once every page has been decoded or dropped.
        let scratch = Arc::new(dir);
        let pages = (first_page..=last_page)
            .map(|page| match rendered.remove(&page) {
                Some(file) => {
                    let scratch = Arc::clone(&scratch);
                    RenderedPage::from_fn(move || {
                        let image = image::open(&file)
                            .map(|img| img.to_rgba8())
                            .map_err(|e| format!("unable to decode rendered page: {}", e));
                        drop(scratch);
                        image
                    })
                }
                None if stderr.is_empty() => {
                    RenderedPage::ready(Err("renderer produced no image".to_string()))
                }
                None => RenderedPage::ready(Err(format!("renderer produced no image: {}", stderr))),
            })
            .collect();

        Ok(pages)
    }
}

/// Map each `page-<n>.png` in `dir` to its page number. Poppler zero-pads `<n>`.
fn collect_output(dir: &Path) -> Result<BTreeMap<u32, PathBuf>> {
    let pattern = Regex::new(r"^page-(\d+)\.png$").map_err(|e| Error::Render(e.to_string()))?;
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Render(format!("failed to list rendered pages: {}", e)))?;

    let files = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let page = pattern.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((page, path))
        })
        .collect();

    Ok(files)
}

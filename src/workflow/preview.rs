use crate::error::{Error, Result};
use crate::page_range;
use crate::pdf::render::PageImage;
use crate::pdf::{PdfDocument, Rasterizer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Selections of at least this many distinct pages render slowly.
pub const SLOW_PREVIEW_PAGES: usize = 30;

/// Selections of more distinct pages than this are refused.
pub const MAX_PREVIEW_PAGES: usize = 50;

/// A checked preview: input chosen and a non-empty selection.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub input: PathBuf,
    pub expression: String,
}

/// One selected page and its bitmap, keyed by its 1-based page number.
#[derive(Debug)]
pub struct PreviewPage {
    pub page: u32,
    pub image: PageImage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewSummary {
    pub rendered: usize,
    pub failed: usize,
}

/// Messages from the preview worker to whoever displays the preview.
///
/// Every run ends with exactly one `Finished` or `Failed`.
#[derive(Debug)]
pub enum PreviewEvent {
    Started {
        first_page: u32,
        last_page: u32,
        pages: usize,
    },
    SlowWarning {
        pages: usize,
    },
    Page(PreviewPage),
    Finished(PreviewSummary),
    Failed(Error),
}

impl PreviewEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PreviewEvent::Finished(_) | PreviewEvent::Failed(_))
    }
}

/// The distinct pages a preview will show, ascending and 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPlan {
    pages: Vec<u32>,
}

impl PreviewPlan {
    /// Apply the preview page-count policy to a selection.
    pub fn new(expression: &str, total_pages: u32) -> Result<Self> {
        let indices = page_range::parse(expression, total_pages)?;
        let pages = page_range::distinct_page_numbers(&indices);

        match pages.len() {
            0 => Err(Error::NoPagesSelected),
            count if count > MAX_PREVIEW_PAGES => Err(Error::TooManyPages {
                count,
                max: MAX_PREVIEW_PAGES,
            }),
            _ => Ok(Self { pages }),
        }
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn first_page(&self) -> u32 {
        self.pages[0]
    }

    pub fn last_page(&self) -> u32 {
        self.pages[self.pages.len() - 1]
    }

    pub fn is_slow(&self) -> bool {
        self.pages.len() >= SLOW_PREVIEW_PAGES
    }

    fn contains(&self, page: u32) -> bool {
        self.pages.binary_search(&page).is_ok()
    }
}

/// Sends the terminal event when dropped, so the receiver always learns that
/// the run is over, even if the worker unwinds.
struct Completion<'a> {
    events: &'a UnboundedSender<PreviewEvent>,
    outcome: Option<Result<PreviewSummary>>,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let event = match self.outcome.take() {
            Some(Ok(summary)) => PreviewEvent::Finished(summary),
            Some(Err(e)) => PreviewEvent::Failed(e),
            None => PreviewEvent::Failed(Error::Render(
                "preview worker stopped unexpectedly".to_string(),
            )),
        };
        // A closed channel means nobody is waiting for the preview any more.
        let _ = self.events.send(event);
    }
}

/// Validate, render and filter a preview, reporting progress over `events`.
///
/// This blocks for as long as rendering takes; use [`spawn`] from async code.
pub fn run(request: &PreviewRequest, rasterizer: &dyn Rasterizer, events: &UnboundedSender<PreviewEvent>) {
    let mut completion = Completion {
        events,
        outcome: None,
    };
    completion.outcome = Some(render(request, rasterizer, events));
}

/// Run a preview on the blocking pool. Events arrive on the receiver paired with `events`.
pub fn spawn(
    request: PreviewRequest,
    rasterizer: Arc<dyn Rasterizer>,
    events: UnboundedSender<PreviewEvent>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || run(&request, rasterizer.as_ref(), &events))
}

fn render(
    request: &PreviewRequest,
    rasterizer: &dyn Rasterizer,
    events: &UnboundedSender<PreviewEvent>,
) -> Result<PreviewSummary> {
    // The document is only needed for its page count; release it before rendering.
    let total_pages = PdfDocument::open(&request.input)?.page_count();
    let plan = PreviewPlan::new(&request.expression, total_pages)?;
    let (first_page, last_page) = (plan.first_page(), plan.last_page());

    let _ = events.send(PreviewEvent::Started {
        first_page,
        last_page,
        pages: plan.pages().len(),
    });
    if plan.is_slow() {
        warn!(pages = plan.pages().len(), "large preview requested");
        let _ = events.send(PreviewEvent::SlowWarning {
            pages: plan.pages().len(),
        });
    }

    let mut rendered = rasterizer
        .rasterize(&request.input, first_page, last_page)?
        .into_iter();

    let mut summary = PreviewSummary::default();
    for page in first_page..=last_page {
        let next = rendered.next();
        // Pages between selected ones are dropped without being decoded.
        if !plan.contains(page) {
            continue;
        }
        let image = match next {
            Some(rendered_page) => rendered_page.decode(),
            None => Err("renderer returned no image".to_string()),
        };

        match &image {
            Ok(_) => summary.rendered += 1,
            Err(message) => {
                warn!(page, %message, "page failed to render");
                summary.failed += 1;
            }
        }
        let _ = events.send(PreviewEvent::Page(PreviewPage { page, image }));
    }

    info!(
        input = %request.input.display(),
        rendered = summary.rendered,
        failed = summary.failed,
        "preview finished"
    );
    Ok(summary)
}

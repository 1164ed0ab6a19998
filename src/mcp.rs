use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::commands::display::save_page;
use crate::pdf::{PdfDocument, Rasterizer};
use crate::session::Session;
use crate::workflow::extract;
use crate::workflow::preview::{self, PreviewEvent, PreviewPage};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PathRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfExtractRequest {
    #[schemars(description = "Path to the source PDF file")]
    pub path: String,
    #[schemars(description = "Page selection (e.g., '1-2, 5-7, 11'); pages may repeat and are written in the order given")]
    pub pages: String,
    #[schemars(description = "Output file path")]
    pub output: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfPreviewRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Page selection (e.g., '1-2, 5-7, 11'); at most 50 distinct pages")]
    pub pages: String,
    #[schemars(description = "Directory the rendered PNG files are written to")]
    pub output_dir: String,
}

#[derive(Debug, Clone)]
pub struct PdfServer {
    rasterizer: Arc<dyn Rasterizer>,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl PdfServer {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PdfServer {
    #[tool(description = "Get the valid page range of a PDF along with its title, author, subject, creator and producer")]
    fn pdf_info(&self, Parameters(PathRequest { path }): Parameters<PathRequest>) -> String {
        match PdfDocument::open(&path) {
            Ok(doc) => {
                let info = doc.get_info();
                let result = PdfInfoResult {
                    path,
                    page_count: info.page_count,
                    title: info.title,
                    author: info.author,
                    subject: info.subject,
                    creator: info.creator,
                    producer: info.producer,
                };
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Copy a selection of pages from a PDF into a new file, in the order they are listed")]
    async fn pdf_extract(&self, Parameters(req): Parameters<PdfExtractRequest>) -> String {
        let request = match Session::new()
            .with_input(req.path)
            .with_output(req.output)
            .with_expression(req.pages)
            .extract_request()
        {
            Ok(r) => r,
            Err(e) => return format!("Error: {}", e),
        };

        // Loading and saving the document blocks, so keep it off the runtime threads.
        let outcome = match tokio::task::spawn_blocking(move || extract::run(&request)).await {
            Ok(outcome) => outcome,
            Err(e) => return format!("Error: {}", e),
        };

        match outcome {
            Ok(summary) => {
                let result = ExtractResult {
                    output_path: summary.output.display().to_string(),
                    page_count: summary.pages as u32,
                };
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Render the selected pages of a PDF to PNG files for a visual preview. Pages that fail to render are reported individually.")]
    async fn pdf_preview(&self, Parameters(req): Parameters<PdfPreviewRequest>) -> String {
        let request = match Session::new()
            .with_input(req.path)
            .with_expression(req.pages)
            .preview_request()
        {
            Ok(r) => r,
            Err(e) => return format!("Error: {}", e),
        };

        let dir = Path::new(&req.output_dir);
        if let Err(e) = std::fs::create_dir_all(dir) {
            return format!("Error: Failed to create directory {}: {}", dir.display(), e);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = preview::spawn(request, self.rasterizer.clone(), tx);

        let mut result = PreviewResult {
            output_dir: req.output_dir.clone(),
            warning: None,
            pages: Vec::new(),
        };
        let mut failure = None;

        while let Some(event) = rx.recv().await {
            match event {
                PreviewEvent::Started { .. } => {}
                PreviewEvent::SlowWarning { pages } => {
                    result.warning = Some(format!("Previewing {} pages may take a while", pages));
                }
                PreviewEvent::Page(page) => result.pages.push(preview_page_result(dir, page)),
                PreviewEvent::Finished(_) => break,
                PreviewEvent::Failed(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if let Err(e) = worker.await {
            return format!("Error: {}", e);
        }
        if let Some(message) = failure {
            return format!("Error: {}", message);
        }
        serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
    }
}

fn preview_page_result(dir: &Path, PreviewPage { page, image }: PreviewPage) -> PreviewPageResult {
    let saved = image.and_then(|image| {
        let path = save_page(dir, page, &image)?;
        Ok((image.width(), image.height(), path))
    });

    match saved {
        Ok((width, height, path)) => PreviewPageResult {
            page,
            path: Some(path.display().to_string()),
            width: Some(width),
            height: Some(height),
            error: None,
        },
        Err(message) => PreviewPageResult {
            page,
            path: None,
            width: None,
            height: None,
            error: Some(message),
        },
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PdfInfoResult {
    pub path: String,
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ExtractResult {
    pub output_path: String,
    pub page_count: u32,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PreviewPageResult {
    pub page: u32,
    pub path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PreviewResult {
    pub output_dir: String,
    pub warning: Option<String>,
    pub pages: Vec<PreviewPageResult>,
}

impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PDF page slicing tools. Use pdf_info to learn the valid page range, \
                 pdf_extract to write a selection of pages (e.g. '1-2, 5-7, 11') to a new PDF, \
                 and pdf_preview to render a selection to PNG files."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server(rasterizer: Arc<dyn Rasterizer>) -> Result<()> {
    let server = PdfServer::new(rasterizer);

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as SliceResult;
    use crate::pdf::document::fixtures::{sample_document, write_to};
    use crate::pdf::RenderedPage;
    use image::RgbaImage;

    #[derive(Debug)]
    struct OddPagesOnly;

    impl Rasterizer for OddPagesOnly {
        fn rasterize(&self, _: &Path, first: u32, last: u32) -> SliceResult<Vec<RenderedPage>> {
            Ok((first..=last)
                .map(|page| {
                    RenderedPage::ready(if page % 2 == 1 {
                        Ok(RgbaImage::new(4, 5))
                    } else {
                        Err("even page".to_string())
                    })
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_extract_tool() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_to(sample_document(3), dir.path(), "in.pdf");
        let output = dir.path().join("out.pdf");
        let server = PdfServer::new(Arc::new(OddPagesOnly));

        let json = server
            .pdf_extract(Parameters(PdfExtractRequest {
                path: input.display().to_string(),
                pages: "3,3".to_string(),
                output: output.display().to_string(),
            }))
            .await;
        let result: ExtractResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.page_count, 2);
        assert_eq!(PdfDocument::open(&output).unwrap().page_count(), 2);
    }

    #[tokio::test]
    async fn test_extract_tool_reports_errors() {
        let server = PdfServer::new(Arc::new(OddPagesOnly));
        let message = server
            .pdf_extract(Parameters(PdfExtractRequest {
                path: "in.pdf".to_string(),
                pages: String::new(),
                output: "out.pdf".to_string(),
            }))
            .await;
        assert_eq!(message, "Error: Please enter page selection");
    }

    #[tokio::test]
    async fn test_extract_tool_reports_blocking_errors() {
        let dir = tempfile::tempdir().unwrap();
        let server = PdfServer::new(Arc::new(OddPagesOnly));
        let message = server
            .pdf_extract(Parameters(PdfExtractRequest {
                path: dir.path().join("missing.pdf").display().to_string(),
                pages: "1".to_string(),
                output: dir.path().join("out.pdf").display().to_string(),
            }))
            .await;
        assert!(message.starts_with("Error: Failed to open PDF"), "{message}");
    }

    #[tokio::test]
    async fn test_preview_tool_reports_pages_inline() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_to(sample_document(4), dir.path(), "in.pdf");
        let preview_dir = dir.path().join("preview");
        let server = PdfServer::new(Arc::new(OddPagesOnly));

        let json = server
            .pdf_preview(Parameters(PdfPreviewRequest {
                path: input.display().to_string(),
                pages: "1-3".to_string(),
                output_dir: preview_dir.display().to_string(),
            }))
            .await;
        let result: PreviewResult = serde_json::from_str(&json).unwrap();

        let pages: Vec<(u32, bool)> = result
            .pages
            .iter()
            .map(|p| (p.page, p.error.is_none()))
            .collect();
        assert_eq!(pages, vec![(1, true), (2, false), (3, true)]);
        assert!(preview_dir.join("page-0003.png").exists());
    }
}

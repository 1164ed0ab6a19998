use crate::commands::display::PreviewDisplay;
use crate::pdf::Rasterizer;
use crate::session::Session;
use crate::workflow::extract;
use crate::workflow::preview::{self, PreviewEvent};
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

const HELP: &str = "\
Commands:
  open <PATH>     Select the input PDF
  output <PATH>   Select where extracted pages are written
  pages <PAGES>   Set the page selection, e.g. 1-2, 5-7, 11
  extract         Write the selected pages to the output PDF
  preview [DIR]   Render the selected pages as PNG files
  status          Show the current selection
  help            Show this help
  quit            Leave the shell";

/// A parsed line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(PathBuf),
    Output(PathBuf),
    Pages(String),
    Extract,
    Preview(Option<PathBuf>),
    Status,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "open" | "input" if !rest.is_empty() => Command::Open(PathBuf::from(rest)),
            "output" | "save" if !rest.is_empty() => Command::Output(PathBuf::from(rest)),
            "open" | "input" | "output" | "save" => {
                return Err(format!("{} needs a file path", name))
            }
            "pages" => Command::Pages(rest.to_string()),
            "extract" => Command::Extract,
            "preview" if rest.is_empty() => Command::Preview(None),
            "preview" => Command::Preview(Some(PathBuf::from(rest))),
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(format!("Unknown command: {} (try 'help')", name)),
        };
        Ok(command)
    }
}

/// Interactive state owned by the shell task. Preview workers only reach it
/// through the event channel.
pub struct Shell {
    session: Session,
    rasterizer: Arc<dyn Rasterizer>,
    preview_dir: PathBuf,
    display: Option<PreviewDisplay>,
    events: UnboundedSender<PreviewEvent>,
}

impl Shell {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        preview_dir: PathBuf,
    ) -> (Self, UnboundedReceiver<PreviewEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shell = Shell {
            session: Session::new(),
            rasterizer,
            preview_dir,
            display: None,
            events,
        };
        (shell, rx)
    }

    pub fn preview_running(&self) -> bool {
        self.display.is_some()
    }

    /// Run one command. Returns `false` when the shell should exit.
    pub async fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Empty => {}
            Command::Open(path) => self.open(&path),
            Command::Output(path) => {
                self.session.select_output(&path);
                println!("Output: {}", file_name(&path));
            }
            Command::Pages(expression) => {
                self.session.set_expression(&expression);
                println!("Pages: {}", expression);
            }
            Command::Extract => self.extract().await,
            Command::Preview(dir) => self.start_preview(dir),
            Command::Status => self.status(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    /// Show a message from the preview worker.
    pub fn on_event(&mut self, event: PreviewEvent) {
        let Some(display) = self.display.as_mut() else {
            debug!(terminal = event.is_terminal(), "preview event with no preview running");
            return;
        };
        if display.handle(event).is_some() {
            self.display = None;
        }
    }

    fn open(&mut self, path: &Path) {
        match self.session.select_input(path) {
            Ok(total) => println!("Input: {} (Pages: 1 - {})", file_name(path), total),
            Err(e) => println!("Input: {} (Error reading PDF: {})", file_name(path), e),
        }
    }

    async fn extract(&mut self) {
        let request = match self.session.extract_request() {
            Ok(request) => request,
            Err(e) => {
                println!("{}", e);
                return;
            }
        };

        match tokio::task::spawn_blocking(move || extract::run(&request)).await {
            Ok(Ok(summary)) => println!(
                "Done! Extracted {} page(s) to {}",
                summary.pages,
                file_name(&summary.output)
            ),
            Ok(Err(e)) => println!("Error: {}", e),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn start_preview(&mut self, dir: Option<PathBuf>) {
        if self.preview_running() {
            println!("A preview is already running");
            return;
        }

        let request = match self.session.preview_request() {
            Ok(request) => request,
            Err(e) => {
                println!("{}", e);
                return;
            }
        };

        let dir = dir.unwrap_or_else(|| self.preview_dir.clone());
        match PreviewDisplay::new(dir) {
            Ok(display) => {
                self.display = Some(display);
                preview::spawn(request, self.rasterizer.clone(), self.events.clone());
            }
            Err(e) => println!("Error: {:#}", e),
        }
    }

    fn status(&self) {
        let show = |path: &Option<PathBuf>| match path {
            Some(path) => path.display().to_string(),
            None => "No file selected".to_string(),
        };
        println!("Input:  {}", show(&self.session.input));
        println!("Output: {}", show(&self.session.output));
        println!("Pages:  {}", self.session.expression);
        if self.preview_running() {
            println!("A preview is running");
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn prompt() {
    print!("pdfslice> ");
    let _ = std::io::stdout().flush();
}

pub async fn run(rasterizer: Arc<dyn Rasterizer>, preview_dir: PathBuf) -> Result<()> {
    let (mut shell, mut events) = Shell::new(rasterizer, preview_dir);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);
    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(command) => {
                        if !shell.execute(command).await {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
                prompt();
            }
            Some(event) = events.recv() => {
                let terminal = event.is_terminal();
                shell.on_event(event);
                if terminal {
                    prompt();
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result as SliceResult};
    use crate::pdf::document::fixtures::{sample_document, write_to};
    use crate::pdf::RenderedPage;
    use image::RgbaImage;

    #[derive(Debug)]
    struct BlankRasterizer;

    impl Rasterizer for BlankRasterizer {
        fn rasterize(&self, _: &Path, first: u32, last: u32) -> SliceResult<Vec<RenderedPage>> {
            Ok((first..=last)
                .map(|_| RenderedPage::ready(Ok(RgbaImage::new(2, 2))))
                .collect())
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("open  my file.pdf "),
            Ok(Command::Open(PathBuf::from("my file.pdf")))
        );
        assert_eq!(
            Command::parse("pages 1-2, 5"),
            Ok(Command::Pages("1-2, 5".to_string()))
        );
        assert_eq!(Command::parse("pages"), Ok(Command::Pages(String::new())));
        assert_eq!(Command::parse("PREVIEW"), Ok(Command::Preview(None)));
        assert_eq!(
            Command::parse("preview out"),
            Ok(Command::Preview(Some(PathBuf::from("out"))))
        );
        assert_eq!(Command::parse("   "), Ok(Command::Empty));
        assert_eq!(Command::parse("exit"), Ok(Command::Quit));
        assert!(Command::parse("open").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_extract_through_shell() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_to(sample_document(4), dir.path(), "in.pdf");
        let output = dir.path().join("out.pdf");

        let (mut shell, _events) = Shell::new(Arc::new(BlankRasterizer), dir.path().join("preview"));
        assert!(shell.execute(Command::Open(input)).await);
        assert!(shell.execute(Command::Output(output.clone())).await);
        assert!(shell.execute(Command::Pages("4, 1".to_string())).await);
        assert!(shell.execute(Command::Extract).await);

        assert_eq!(crate::pdf::PdfDocument::open(&output).unwrap().page_count(), 2);
        assert!(!shell.execute(Command::Quit).await);
    }

    #[tokio::test]
    async fn test_preview_guard_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_to(sample_document(3), dir.path(), "in.pdf");
        let preview_dir = dir.path().join("preview");

        let (mut shell, mut events) = Shell::new(Arc::new(BlankRasterizer), preview_dir.clone());
        shell.execute(Command::Open(input)).await;
        shell.execute(Command::Pages("1,3".to_string())).await;
        shell.execute(Command::Preview(None)).await;
        assert!(shell.preview_running());

        // A second preview is refused while the first is still running.
        shell.execute(Command::Preview(None)).await;

        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            shell.on_event(event);
            if terminal {
                break;
            }
        }
        assert!(!shell.preview_running());
        assert!(preview_dir.join("page-0001.png").exists());
        assert!(!preview_dir.join("page-0002.png").exists());
        assert!(preview_dir.join("page-0003.png").exists());

        // Only one run was started, so nothing else is queued.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_preview_needs_input() {
        let dir = tempfile::tempdir().unwrap();
        let (mut shell, _events) = Shell::new(Arc::new(BlankRasterizer), dir.path().to_path_buf());
        shell.execute(Command::Pages("1".to_string())).await;
        shell.execute(Command::Preview(None)).await;
        assert!(!shell.preview_running());
        assert!(matches!(shell.session.preview_request(), Err(Error::MissingInput)));
    }
}

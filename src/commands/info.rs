use crate::pdf::PdfDocument;
use anyhow::Result;
use std::path::Path;

pub fn run<P: AsRef<Path>>(path: P) -> Result<()> {
    let doc = PdfDocument::open(&path)?;
    let info = doc.get_info();

    println!("File: {}", path.as_ref().display());
    println!("Pages: 1 - {}", info.page_count);

    let fields = [
        ("Title", &info.title),
        ("Author", &info.author),
        ("Subject", &info.subject),
        ("Creator", &info.creator),
        ("Producer", &info.producer),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            println!("{}: {}", name, value);
        }
    }

    Ok(())
}

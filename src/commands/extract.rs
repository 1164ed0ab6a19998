use crate::session::Session;
use crate::workflow::extract;
use anyhow::Result;
use std::path::Path;

pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(input: P, pages: &str, output: Q) -> Result<()> {
    let request = Session::new()
        .with_input(input.as_ref())
        .with_output(output.as_ref())
        .with_expression(pages)
        .extract_request()?;

    let summary = extract::run(&request)?;

    println!(
        "Extracted {} page(s) to {}",
        summary.pages,
        summary.output.display()
    );

    Ok(())
}

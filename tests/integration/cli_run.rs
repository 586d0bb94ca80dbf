//! The command-line driver against real files.

use clap::Parser;
use serial_test::serial;

use pdfstitch::StitchError;
use pdfstitch::cli::{self, Cli};

use crate::common::{page_rotations, page_texts, write_pdf};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("pdfstitch").chain(args.iter().copied()))
        .expect("valid arguments")
}

#[tokio::test]
#[serial]
async fn test_merge_with_deletes_and_rotations() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", 3);
    let b = write_pdf(dir.path(), "b.pdf", 1);
    let output = dir.path().join("out.pdf");

    let cli = parse(&[
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--delete",
        "1:2",
        "--rotate",
        "2:1=270",
        "-q",
    ]);
    cli::run(cli).await.unwrap();

    let bytes = std::fs::read(&output).unwrap();
    let texts = page_texts(&bytes);
    assert_eq!(texts.len(), 3);
    assert!(texts[0].contains("a.pdf page 1"));
    assert!(texts[1].contains("a.pdf page 3"));
    assert!(texts[2].contains("b.pdf page 1"));
    assert_eq!(page_rotations(&bytes), vec![0, 0, 270]);
}

#[tokio::test]
#[serial]
async fn test_page_selection_into_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let inputs = dir.path().join("in");
    std::fs::create_dir(&inputs).unwrap();
    write_pdf(&inputs, "doc2.pdf", 2);
    write_pdf(&inputs, "doc10.pdf", 2);
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    // Directory inputs sort naturally: doc2 is input 1, doc10 input 2.
    let cli = parse(&[
        inputs.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "--page",
        "2:2@90",
        "--page",
        "1:1",
        "--name",
        "picked",
        "-q",
    ]);
    cli::run(cli).await.unwrap();

    let bytes = std::fs::read(out_dir.join("picked.pdf")).unwrap();
    let texts = page_texts(&bytes);
    assert!(texts[0].contains("doc10.pdf page 2"));
    assert!(texts[1].contains("doc2.pdf page 1"));
    assert_eq!(page_rotations(&bytes), vec![90, 0]);
}

#[tokio::test]
#[serial]
async fn test_dry_run_writes_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", 2);
    let output = dir.path().join("out.pdf");

    let cli = parse(&[
        a.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--dry-run",
        "-q",
    ]);
    cli::run(cli).await.unwrap();
    assert!(!output.exists());
}

#[tokio::test]
#[serial]
async fn test_existing_output_needs_force() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", 1);
    let output = dir.path().join("out.pdf");
    std::fs::write(&output, b"keep me").unwrap();

    let args = [a.to_str().unwrap(), "-o", output.to_str().unwrap(), "-q"];
    let err = cli::run(parse(&args)).await.unwrap_err();
    assert!(matches!(err, StitchError::Validation { .. }));
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let mut forced = args.to_vec();
    forced.push("--force");
    cli::run(parse(&forced)).await.unwrap();
    assert_eq!(page_texts(&std::fs::read(&output).unwrap()).len(), 1);
}

#[tokio::test]
#[serial]
async fn test_bad_references_fail_cleanly() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", 1);
    let notes = dir.path().join("notes.pdf");
    std::fs::write(&notes, b"not really a pdf").unwrap();
    let output = dir.path().join("out.pdf");

    let err = cli::run(parse(&[
        a.to_str().unwrap(),
        notes.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--delete",
        "2:1",
        "-q",
    ]))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("input 2 is not a PDF"));

    let missing = dir.path().join("missing.pdf");
    let err = cli::run(parse(&[
        missing.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-q",
    ]))
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(!output.exists());
}

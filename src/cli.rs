//! Command-line driver.
//!
//! The binary runs one ephemeral session: it uploads the inputs, applies
//! page deletions and rotations, merges, and writes the download to disk.
//!
//! ```text
//! pdfstitch scans/*.pdf --delete 1:2 --rotate 2:1=90 -o merged.pdf
//! pdfstitch a.pdf b.pdf --page 2:1 --page 1:3@180 -o out/
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{
    Config, ENV_INLINE_PAGE_MERGES, ENV_MAX_UPLOAD_MB, ENV_POOL_CAPACITY, ENV_STORE_DIR,
    StorageBackend,
};
use crate::error::{Result, StitchError};
use crate::ids::FileId;
use crate::merge::{MergeRequestBody, PageItemBody};
use crate::output::OutputFormatter;
use crate::session::{Session, SourceFile};
use crate::service::{PageRef, Upload, Workspace};
use crate::utils::collect_paths_for_patterns;

/// Assemble pages from several PDFs into one document.
///
/// Inputs are numbered from 1 in the order given (after glob and
/// directory expansion). Page numbers are 1-based.
#[derive(Parser, Debug)]
#[command(name = "pdfstitch")]
#[command(version)]
#[command(about = "Pick, delete and rotate pages across PDFs, then merge them", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input PDF files, glob patterns or directories
    ///
    /// Directories are scanned recursively for `*.pdf`.
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Output file, or a directory to write the download into
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Delete page P of input I (repeatable)
    #[arg(long = "delete", value_name = "I:P")]
    pub deletes: Vec<PageTarget>,

    /// Set the rotation of page P of input I (repeatable)
    #[arg(long = "rotate", value_name = "I:P=DEG")]
    pub rotations: Vec<RotateTarget>,

    /// Merge exactly these pages, in order (repeatable)
    ///
    /// Switches to a page-level merge; deletions and rotations set with
    /// --delete and --rotate do not apply to listed pages.
    #[arg(long = "page", value_name = "I:P[@DEG]")]
    pub pages: Vec<PageSelection>,

    /// Download name, used when OUTPUT is a directory
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Number of whole-file merges allowed to run at once
    #[arg(short, long, value_name = "N", env = ENV_POOL_CAPACITY)]
    pub jobs: Option<usize>,

    /// Keep blobs in this directory instead of memory
    #[arg(long, value_name = "DIR", env = ENV_STORE_DIR)]
    pub store_dir: Option<PathBuf>,

    /// Per-file upload limit in MB
    #[arg(long, value_name = "MB", env = ENV_MAX_UPLOAD_MB)]
    pub max_upload_mb: Option<u64>,

    /// Run page-level merges outside the merge pool
    #[arg(
        long,
        value_name = "BOOL",
        env = ENV_INLINE_PAGE_MERGES,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub inline_page_merges: Option<bool>,

    /// Print the resolved pages without merging
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the plan or the merge result as JSON
    #[arg(long)]
    pub json: bool,

    /// Overwrite OUTPUT if it exists
    #[arg(short, long)]
    pub force: bool,

    /// Show source sizes and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl TryFrom<&Cli> for Config {
    type Error = StitchError;

    fn try_from(cli: &Cli) -> Result<Self> {
        let mut config = Config::default();
        if let Some(mb) = cli.max_upload_mb {
            config = config.with_max_upload_mb(mb);
        }
        if let Some(jobs) = cli.jobs {
            config.pool_capacity = jobs;
        }
        if let Some(inline) = cli.inline_page_merges {
            config.inline_page_merges = inline;
        }
        if let Some(dir) = &cli.store_dir {
            config.storage = StorageBackend::Filesystem(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// `I:P`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTarget {
    pub input: usize,
    pub page: u32,
}

impl FromStr for PageTarget {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self> {
        let (input, page) = s
            .split_once(':')
            .ok_or_else(|| StitchError::validation(format!("expected INPUT:PAGE, got '{s}'")))?;
        Ok(Self {
            input: parse_part(input, "input", s)?,
            page: parse_part(page, "page", s)?,
        })
    }
}

/// `I:P=DEG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateTarget {
    pub target: PageTarget,
    pub degrees: i64,
}

impl FromStr for RotateTarget {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self> {
        let (target, degrees) = s.split_once('=').ok_or_else(|| {
            StitchError::validation(format!("expected INPUT:PAGE=DEGREES, got '{s}'"))
        })?;
        Ok(Self {
            target: target.parse()?,
            degrees: parse_part(degrees, "rotation", s)?,
        })
    }
}

/// `I:P` or `I:P@DEG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSelection {
    pub target: PageTarget,
    pub degrees: i64,
}

impl FromStr for PageSelection {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self> {
        let (target, degrees) = match s.split_once('@') {
            Some((target, degrees)) => (target, parse_part(degrees, "rotation", s)?),
            None => (s, 0),
        };
        Ok(Self {
            target: target.parse()?,
            degrees,
        })
    }
}

fn parse_part<T: FromStr>(value: &str, what: &str, whole: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StitchError::validation(format!("invalid {what} in '{whole}'")))
}

/// Run the driver to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let out = OutputFormatter::new(cli.quiet, cli.verbose);
    let config = Config::try_from(&cli)?;

    let paths = collect_paths_for_patterns(&cli.inputs)?;
    if paths.is_empty() {
        return Err(StitchError::validation("no input files matched"));
    }

    let workspace = Workspace::open(config).await?;
    let session = workspace.session(None);

    // The session's blobs are released whatever the outcome.
    let result = drive(&workspace, &session, &cli, &paths, &out).await;
    workspace.end_session(session.id()).await;
    result
}

async fn drive(
    workspace: &Workspace,
    session: &Arc<Session>,
    cli: &Cli,
    paths: &[PathBuf],
    out: &OutputFormatter,
) -> Result<()> {
    out.info(&format!("Uploading {} file(s)...", paths.len()));
    let inputs = upload_inputs(workspace, session, paths, out).await?;

    for delete in &cli.deletes {
        let file = input_file(&inputs, delete.input)?;
        workspace.delete_pages(
            session,
            &[PageRef {
                file_id: file.id.clone(),
                page: delete.page,
            }],
        )?;
        out.debug(&format!("Deleted {} p.{}", file.display_name, delete.page));
    }
    for rotate in &cli.rotations {
        let file = input_file(&inputs, rotate.target.input)?;
        workspace.rotate_page(session, &file.id, rotate.target.page, rotate.degrees)?;
        out.debug(&format!(
            "Rotated {} p.{} to {}°",
            file.display_name, rotate.target.page, rotate.degrees
        ));
    }

    let body = merge_body(cli, &inputs)?;

    if cli.dry_run {
        let plan = workspace.plan(session, body).await?;
        if cli.json {
            return out.json(&plan);
        }
        out.plan(&plan);
        out.success(&format!(
            "Dry run complete, output would be {}",
            cli.output.display()
        ));
        return Ok(());
    }

    write_merge(workspace, session, cli, body, out).await
}

async fn upload_inputs(
    workspace: &Workspace,
    session: &Session,
    paths: &[PathBuf],
    out: &OutputFormatter,
) -> Result<Vec<Option<SourceFile>>> {
    let mut inputs = Vec::with_capacity(paths.len());
    for (position, path) in paths.iter().enumerate() {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let accepted = workspace
            .upload(session, vec![Upload::new(name, bytes)])
            .await?
            .files
            .pop();
        match &accepted {
            Some(file) => out.source_file(position + 1, file),
            None => out.warning(&format!("Skipping {}: not a PDF", path.display())),
        }
        inputs.push(accepted);
    }
    Ok(inputs)
}

fn input_file(inputs: &[Option<SourceFile>], input: usize) -> Result<&SourceFile> {
    match input.checked_sub(1).and_then(|index| inputs.get(index)) {
        Some(Some(file)) => Ok(file),
        Some(None) => Err(StitchError::validation(format!(
            "input {input} is not a PDF"
        ))),
        None => Err(StitchError::validation(format!(
            "input {input} does not exist ({} inputs)",
            inputs.len()
        ))),
    }
}

fn merge_body(cli: &Cli, inputs: &[Option<SourceFile>]) -> Result<MergeRequestBody> {
    let page_items = cli
        .pages
        .iter()
        .map(|selection| {
            let file = input_file(inputs, selection.target.input)?;
            Ok(PageItemBody {
                file_id: file.id.clone(),
                page: i64::from(selection.target.page),
                rotation: selection.degrees,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let file_ids: Vec<FileId> = inputs.iter().flatten().map(|file| file.id.clone()).collect();

    Ok(MergeRequestBody {
        file_ids,
        page_items,
    })
}

async fn write_merge(
    workspace: &Workspace,
    session: &Arc<Session>,
    cli: &Cli,
    body: MergeRequestBody,
    out: &OutputFormatter,
) -> Result<()> {
    let merged = workspace.merge(Arc::clone(session), body).await?;
    let download = workspace
        .download(session, &merged.download_url, cli.name.as_deref())
        .await?;

    let target = if cli.output.is_dir() {
        cli.output.join(&download.file_name)
    } else {
        cli.output.clone()
    };
    write_output(&target, &download.bytes, cli.force).await?;

    if cli.json {
        return out.json(&merged);
    }
    out.success(&format!(
        "Wrote {} pages to {}",
        merged.pages,
        target.display()
    ));
    Ok(())
}

/// Write through a temporary sibling so a failed write never leaves a
/// partial file at `target`.
async fn write_output(target: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(target).await? {
        return Err(StitchError::validation(format!(
            "{} already exists, use --force to overwrite",
            target.display()
        )));
    }

    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

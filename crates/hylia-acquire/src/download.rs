use crate::error::{HyliaError, Result};
use crate::fetch::Site;
use crate::soundtrack::Soundtrack;
use hylia_model::File;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Attempts per file before it is skipped.
pub const DOWNLOAD_TRIES: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Create the target directory and its parents if missing.
    pub make_dirs: bool,
    /// Print per-file progress to stdout.
    pub verbose: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            make_dirs: true,
            verbose: false,
        }
    }
}

/// Filenames by outcome, each in download order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    /// Skipped because a file of the same name was already in the target directory.
    pub already_present: Vec<String>,
    pub failed: Vec<String>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.already_present.len() + self.failed.len()
    }
}

/// Everything to download for a soundtrack: the primary file of each song,
/// in page order, then the album's images in page order.
///
/// Resolves every song page that has not been resolved yet.
pub async fn file_list(site: &Site, soundtrack: &mut Soundtrack) -> Result<Vec<File>> {
    let contents = soundtrack.load(site).await?;

    let mut files = Vec::with_capacity(contents.songs.len() + contents.images.len());
    for song in contents.songs.iter_mut() {
        let url = song.url().clone();
        let primary = song
            .files(site)
            .await?
            .first()
            .cloned()
            .ok_or_else(|| HyliaError::structure(&url, "song without files"))?;
        files.push(primary);
    }
    files.extend(contents.images.iter().cloned());

    Ok(files)
}

/// Download a whole soundtrack into `path`.
///
/// The file list is built before the directory is touched, so an unknown
/// soundtrack fails with [`HyliaError::NonexistentSoundtrack`] and leaves
/// nothing behind. Per-file failures do not abort the batch; they end up in
/// [`DownloadReport::failed`].
pub async fn download(
    site: &Site,
    soundtrack: &mut Soundtrack,
    path: &Path,
    options: DownloadOptions,
) -> Result<DownloadReport> {
    if options.verbose {
        println!("Getting song list...");
    }
    let files = file_list(site, soundtrack).await?;
    let target = prepare_target(path, options.make_dirs)?;

    tracing::info!(
        id = %soundtrack.id(),
        files = files.len(),
        target = %target.display(),
        "Downloading soundtrack"
    );
    Ok(download_files(site, &files, &target, options).await)
}

/// Download `files` one after another into the existing directory `target`.
///
/// A file whose name already exists in `target` is skipped without being
/// checked. Connectivity failures are retried up to [`DOWNLOAD_TRIES`]
/// times; any other failure skips the file at once.
pub async fn download_files(
    site: &Site,
    files: &[File],
    target: &Path,
    options: DownloadOptions,
) -> DownloadReport {
    let total = files.len();
    let mut report = DownloadReport::default();

    for (index, file) in files.iter().enumerate() {
        let counter = progress_counter(index + 1, total);
        let destination = target.join(&file.filename);

        if destination.is_file() {
            if options.verbose {
                println!("Skipping over {counter}{}. Already exists.", file.filename);
            }
            tracing::debug!(path = %destination.display(), "Already present");
            report.already_present.push(file.filename.clone());
            continue;
        }

        if options.verbose {
            println!("Downloading {counter}{}...", file.filename);
        }
        match download_file(site, file, &destination, options.verbose).await {
            Ok(bytes) => {
                tracing::info!(path = %destination.display(), bytes, "Saved file");
                report.downloaded.push(file.filename.clone());
            }
            Err(err) => {
                tracing::warn!(url = %file.url, error = %err, "Skipping file");
                report.failed.push(file.filename.clone());
            }
        }
    }

    report
}

/// Fetch one file and write it to `destination`, returning the byte count.
///
/// The body is written in one go after it has been fetched in full. An
/// interrupt during the write can still leave a truncated file, which a
/// later run will take for a finished one.
async fn download_file(site: &Site, file: &File, destination: &Path, verbose: bool) -> Result<usize> {
    let name = file.filename.as_str();
    let body = with_retries(DOWNLOAD_TRIES, |attempt| {
        if attempt > 1 && verbose {
            println!("Couldn't download {name}. Trying again...");
        }
        site.fetch_file(&file.url)
    })
    .await
    .inspect_err(|_| {
        if verbose {
            println!("Couldn't download {name}. Skipping over.");
        }
    })?;

    fs::write(destination, &body).map_err(|source| {
        if verbose {
            println!("Couldn't save {name}. Please check your permissions.");
        }
        HyliaError::io(destination, source)
    })?;
    Ok(body.len())
}

/// Run `op` until it succeeds, fails with something other than a
/// connectivity error, or has been tried `tries` times.
///
/// `op` receives the 1-based attempt number.
pub async fn with_retries<T, F, Fut>(tries: u32, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Err(err) if err.is_connectivity() && attempt < tries => {
                tracing::warn!(attempt, error = %err, "Connectivity failure, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Make sure the target directory exists and return its canonical path.
fn prepare_target(path: &Path, make_dirs: bool) -> Result<PathBuf> {
    if make_dirs && !path.is_dir() {
        fs::create_dir_all(path).map_err(|source| HyliaError::io(path, source))?;
    }
    fs::canonicalize(path).map_err(|source| HyliaError::io(path, source))
}

/// `"07/12: "`, with the index zero-padded to the width of the total.
fn progress_counter(index: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("{index:0width$}/{total}: ")
}

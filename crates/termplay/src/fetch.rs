//! Default sample retrieval.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const DEFAULT_SAMPLE_URL: &str =
    "https://github.com/konamata/goplay/raw/refs/heads/main/dist/xizm.mp3";
pub const DEFAULT_SAMPLE_NAME: &str = "termplay-default.mp3";

pub fn default_sample_path(dir: &Path) -> PathBuf {
    dir.join(DEFAULT_SAMPLE_NAME)
}

/// Download the default sample into `dir`, replacing any earlier copy.
pub fn fetch_default_sample(dir: &Path) -> Result<PathBuf> {
    let dest = default_sample_path(dir);
    download(DEFAULT_SAMPLE_URL, &dest)?;
    Ok(dest)
}

/// Fetch `url` into `dest`. The body lands in a `.part` file first so a failed transfer
/// never leaves a truncated `dest` behind.
pub fn download(url: &str, dest: &Path) -> Result<u64> {
    download_with(&ureq::agent(), url, dest)
}

fn download_with(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<u64> {
    let resp = agent
        .get(url)
        .call()
        .with_context(|| format!("GET {url}"))?;
    let (_, body) = resp.into_parts();

    let part = dest.with_extension("part");
    let copied = (|| -> Result<u64> {
        let mut file = File::create(&part).with_context(|| format!("create {:?}", part))?;
        let n = io::copy(&mut body.into_reader(), &mut file).context("read response body")?;
        file.flush().context("flush download")?;
        Ok(n)
    })();

    let bytes = match copied {
        Ok(0) => {
            discard_partial(&part);
            bail!("empty response from {url}");
        }
        Ok(n) => n,
        Err(e) => {
            discard_partial(&part);
            return Err(e);
        }
    };

    fs::rename(&part, dest).with_context(|| format!("rename {:?} -> {:?}", part, dest))?;
    tracing::info!(url, path = ?dest, bytes, "downloaded");
    Ok(bytes)
}

fn discard_partial(part: &Path) {
    match fs::remove_file(part) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = ?part, "no partial download to remove");
        }
        Err(e) => tracing::warn!(path = ?part, "failed to remove partial download: {e}"),
    }
}

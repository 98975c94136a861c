use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{errors::Error, Result};

/// Log-bundle housekeeping for the logs directory.
///
/// On startup, leftover `*.log` files from the previous run are bundled into a
/// timestamped zip; the console `/rem_arcs` command deletes every bundle.
#[derive(Clone, Debug)]
pub struct LogArchiver {
    logs_dir: PathBuf,
}

impl LogArchiver {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Bundle leftover `*.log` files into `logs-<timestamp>.zip`, removing the
    /// originals. Returns how many files were archived.
    pub fn archive_previous(&self) -> Result<usize> {
        let logs = self.files_with_extension("log")?;
        if logs.is_empty() {
            return Ok(0);
        }

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let archive_path = self.logs_dir.join(format!("logs-{stamp}.zip"));
        let file = fs::File::create(&archive_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut archived = 0usize;
        for path in &logs {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut contents = Vec::new();
            fs::File::open(path)?.read_to_end(&mut contents)?;
            zip.start_file(name, options).map_err(zip_err)?;
            zip.write_all(&contents)?;
            archived += 1;
        }
        zip.finish().map_err(zip_err)?;

        for path in &logs {
            fs::remove_file(path)?;
        }

        debug!(archived, archive = %archive_path.display(), "previous logs bundled");
        Ok(archived)
    }

    /// Delete every `*.zip` bundle. Returns how many were removed.
    pub fn remove_archives(&self) -> Result<usize> {
        let archives = self.files_with_extension("zip")?;
        for path in &archives {
            fs::remove_file(path)?;
        }
        Ok(archives.len())
    }

    fn files_with_extension(&self, ext: &str) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        if !self.logs_dir.exists() {
            return Ok(out);
        }

        for entry in fs::read_dir(&self.logs_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }
}

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(prefix: &str) -> PathBuf {
        let dir = PathBuf::from(format!("/tmp/{prefix}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn archives_leftover_logs_and_removes_them() {
        let dir = tmp_dir("vqb-arch");
        fs::write(dir.join("bot.log"), "one").unwrap();
        fs::write(dir.join("quiz.log"), "two").unwrap();
        fs::write(dir.join("keep.txt"), "three").unwrap();

        let archiver = LogArchiver::new(&dir);
        assert_eq!(archiver.archive_previous().unwrap(), 2);

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().any(|n| n.ends_with(".zip")));
        assert!(!names.iter().any(|n| n.ends_with(".log")));
        assert!(names.contains(&"keep.txt".to_string()));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn remove_archives_deletes_every_bundle() {
        let dir = tmp_dir("vqb-remarcs");
        fs::write(dir.join("logs-1.zip"), "a").unwrap();
        fs::write(dir.join("logs-2.zip"), "b").unwrap();
        fs::write(dir.join("bot.log"), "c").unwrap();

        let archiver = LogArchiver::new(&dir);
        assert_eq!(archiver.remove_archives().unwrap(), 2);

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["bot.log".to_string()]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_logs_dir_is_not_an_error() {
        let archiver = LogArchiver::new("/tmp/vqb-does-not-exist");
        assert_eq!(archiver.archive_previous().unwrap(), 0);
        assert_eq!(archiver.remove_archives().unwrap(), 0);
    }
}

use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "cbz";

/// Packs a chapter directory into `<dir>.cbz` next to it.
pub struct ChapterArchiver;

impl ChapterArchiver {
    pub fn new() -> Self {
        Self
    }

    pub fn archive_path(chapter_dir: &Path) -> Result<PathBuf> {
        let name = chapter_dir
            .file_name()
            .ok_or_else(|| anyhow!("{} has no directory name", chapter_dir.display()))?;
        let mut file_name = name.to_os_string();
        file_name.push(".");
        file_name.push(ARCHIVE_EXTENSION);
        Ok(chapter_dir.with_file_name(file_name))
    }

    /// Writes every file of `chapter_dir` into the archive, flat and in file
    /// name order, with fixed timestamps so identical input gives identical
    /// bytes.
    pub fn compress_chapter(&self, chapter_dir: &Path) -> Result<PathBuf> {
        let archive_path = Self::archive_path(chapter_dir)?;

        let mut files: Vec<PathBuf> = fs::read_dir(chapter_dir)
            .with_context(|| format!("reading {}", chapter_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let file = File::create(&archive_path)
            .with_context(|| format!("creating {}", archive_path.display()))?;
        let mut zip = ZipWriter::new(file);

        for path in &files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            debug!("writing {} to {}", name, archive_path.display());
            zip.start_file(name, options)?;
            let mut source = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            io::copy(&mut source, &mut zip)?;
        }
        zip.finish()?;

        info!("created {} ({} images)", archive_path.display(), files.len());
        Ok(archive_path)
    }

    pub fn remove_sources(&self, chapter_dir: &Path) -> Result<()> {
        fs::remove_dir_all(chapter_dir)
            .with_context(|| format!("removing {}", chapter_dir.display()))?;
        debug!("removed {}", chapter_dir.display());
        Ok(())
    }
}

impl Default for ChapterArchiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn chapter_with_pages(root: &Path, name: &str, count: usize) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        // written out of order on purpose
        for n in (0..count).rev() {
            fs::write(dir.join(format!("{n:03}.jpg")), format!("image {n}")).unwrap();
        }
        dir
    }

    #[test]
    fn archive_holds_sorted_flat_entries() {
        let root = tempfile::tempdir().unwrap();
        let dir = chapter_with_pages(root.path(), "007", 5);

        let path = ChapterArchiver::new().compress_chapter(&dir).unwrap();
        assert_eq!(path, root.path().join("007.cbz"));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["000.jpg", "001.jpg", "002.jpg", "003.jpg", "004.jpg"]);

        let mut contents = String::new();
        archive
            .by_name("003.jpg")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "image 3");
    }

    #[test]
    fn fractional_chapter_keeps_its_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = chapter_with_pages(root.path(), "010.5", 1);
        assert_eq!(
            ChapterArchiver::archive_path(&dir).unwrap(),
            root.path().join("010.5.cbz")
        );
    }

    #[test]
    fn archives_are_reproducible() {
        let root = tempfile::tempdir().unwrap();
        let dir = chapter_with_pages(root.path(), "001", 3);
        let archiver = ChapterArchiver::new();

        let first = fs::read(archiver.compress_chapter(&dir).unwrap()).unwrap();
        let second = fs::read(archiver.compress_chapter(&dir).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sources_can_be_removed() {
        let root = tempfile::tempdir().unwrap();
        let dir = chapter_with_pages(root.path(), "002", 2);
        let archiver = ChapterArchiver::new();
        archiver.compress_chapter(&dir).unwrap();
        archiver.remove_sources(&dir).unwrap();
        assert!(!dir.exists());
        assert!(root.path().join("002.cbz").exists());
    }
}

//! Temporary export files: location, CSV appends, downloads and cleanup.

use std::fs::{self, DirEntry, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use domain::models::RequestDescriptor;
use domain::services::{DateDisplay, TransientStore};
use domain::ExportError;
use shared::sanitize::{sanitize_file_name, sanitize_key};
use tracing::{debug, info, warn};

/// Transient gating the temporary directory cleanup.
pub const TMPDATA_CLEARED_TRANSIENT: &str = "entries-export-tmpdata-cleared";

const EXPORT_DIR: &str = "export";
const INDEX_HTML: &str = "index.html";
const HTACCESS: &str = ".htaccess";
const HTACCESS_RULES: &str = "# Disable PHP and Python scripts parsing.
<Files *>
  SetHandler none
  SetHandler default-handler
  RemoveHandler .cgi .php .php3 .php4 .php5 .phtml .pl .py .pyc .pyo
  RemoveType .cgi .php .php3 .php4 .php5 .phtml .pl .py .pyc .pyo
</Files>
<IfModule mod_php5.c>
  php_flag engine off
</IfModule>
<IfModule mod_php7.c>
  php_flag engine off
</IfModule>
<IfModule headers_module>
  Header set X-Robots-Tag \"noindex\"
</IfModule>
deny from all
";

/// Local time format used in download file names.
const FILE_NAME_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// An export file ready to be streamed to the client.
#[derive(Debug)]
pub struct ExportDownload {
    pub file_name: String,
    pub file: File,
    pub len: u64,
}

impl ExportDownload {
    /// Response headers of the download, in emission order.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Cache-Control", "no-cache, must-revalidate, max-age=0".into()),
            ("Expires", "Wed, 11 Jan 1984 05:00:00 GMT".into()),
            ("Content-Description", "File Transfer".into()),
            ("Content-Type", "text/csv".into()),
            (
                "Content-Disposition",
                format!("attachment; filename={}", self.file_name),
            ),
            ("Content-Transfer-Encoding", "binary".into()),
            ("Content-Length", self.len.to_string()),
        ]
    }
}

/// Temporary file handling for one export configuration.
#[derive(Clone)]
pub struct ExportFile {
    uploads_dir: PathBuf,
    separator: u8,
    ttl_secs: i64,
    sweep_gate_secs: i64,
    delete_after_download: bool,
    file_times: DateDisplay,
    transients: Arc<dyn TransientStore>,
}

impl ExportFile {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        separator: u8,
        ttl_secs: i64,
        gmt_offset_hours: f64,
        transients: Arc<dyn TransientStore>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            separator,
            ttl_secs,
            sweep_gate_secs: 3600,
            delete_after_download: false,
            file_times: DateDisplay::new(FILE_NAME_DATE_FORMAT, gmt_offset_hours),
            transients,
        }
    }

    pub fn with_sweep_gate(mut self, secs: i64) -> Self {
        self.sweep_gate_secs = secs;
        self
    }

    pub fn with_delete_after_download(mut self, delete: bool) -> Self {
        self.delete_after_download = delete;
        self
    }

    /// The temporary directory, created and protected on first use.
    pub fn tmpdir(&self) -> io::Result<PathBuf> {
        let dir = self.uploads_dir.join(EXPORT_DIR);
        fs::create_dir_all(&dir)?;

        create_if_missing(&self.uploads_dir.join(HTACCESS), HTACCESS_RULES)?;
        create_if_missing(&self.uploads_dir.join(INDEX_HTML), "")?;
        create_if_missing(&dir.join(INDEX_HTML), "")?;

        Ok(dir)
    }

    /// Path of the descriptor's file. The file is created if needed and its
    /// modification time refreshed.
    pub fn tmpfname(&self, descriptor: &RequestDescriptor) -> io::Result<PathBuf> {
        let name = sanitize_key(&descriptor.request_id);
        if name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "request id has no usable characters",
            ));
        }

        let path = self.tmpdir()?.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.set_modified(SystemTime::now())?;
        Ok(path)
    }

    /// Appends rows to the descriptor's file.
    ///
    /// Returns the file length before the append so the caller can undo it.
    /// A failed append leaves the file as it was.
    pub fn write_csv(
        &self,
        rows: &[Vec<String>],
        descriptor: &RequestDescriptor,
    ) -> Result<u64, ExportError> {
        let path = self.tmpfname(descriptor)?;
        let before = fs::metadata(&path)?.len();

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator)
            .terminator(csv::Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| ExportError::Io(e.to_string()))?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.to_string()))?;

        let mut file = OpenOptions::new().append(true).open(&path)?;
        if let Err(e) = file.write_all(&buffer).and_then(|_| file.flush()) {
            warn!(path = %path.display(), error = %e, "Failed to append export rows");
            if let Err(e) = file.set_len(before) {
                warn!(path = %path.display(), error = %e, "Failed to truncate export file");
            }
            return Err(e.into());
        }

        debug!(
            request_id = %descriptor.request_id,
            rows = rows.len(),
            bytes = buffer.len(),
            "Appended rows to export file"
        );
        Ok(before)
    }

    /// Truncates the descriptor's file back to `len` bytes.
    pub fn truncate(&self, descriptor: &RequestDescriptor, len: u64) {
        let result = self.tmpfname(descriptor).and_then(|path| {
            OpenOptions::new().write(true).open(path)?.set_len(len)
        });
        if let Err(e) = result {
            warn!(request_id = %descriptor.request_id, error = %e, "Failed to roll back export file");
        }
    }

    /// Opens the descriptor's file for download.
    pub fn output_file(
        &self,
        descriptor: Option<&RequestDescriptor>,
    ) -> Result<ExportDownload, ExportError> {
        let descriptor = descriptor.ok_or(ExportError::UnknownRequest)?;

        let path = self.tmpfname(descriptor).map_err(|e| {
            warn!(request_id = %descriptor.request_id, error = %e, "Export file is not accessible");
            ExportError::FileNotReadable
        })?;
        let metadata = fs::metadata(&path).map_err(|_| ExportError::FileNotReadable)?;
        if metadata.is_dir() {
            return Err(ExportError::FileNotReadable);
        }
        let file = File::open(&path).map_err(|_| ExportError::FileNotReadable)?;
        if metadata.len() == 0 {
            return Err(ExportError::FileEmpty);
        }

        if self.delete_after_download {
            // The open handle keeps the contents readable.
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to delete downloaded export file");
            }
        }

        Ok(ExportDownload {
            file_name: self.file_name(descriptor),
            file,
            len: metadata.len(),
        })
    }

    /// `wpforms-{form id}-{title}[-entry-{id}]-{local time}.csv`
    pub fn file_name(&self, descriptor: &RequestDescriptor) -> String {
        let entry_suffix = descriptor
            .entry_id()
            .map(|id| format!("-entry-{}", id))
            .unwrap_or_default();

        format!(
            "wpforms-{}-{}{}-{}.csv",
            descriptor.db_args.form_id,
            sanitize_file_name(&descriptor.form_data.title),
            entry_suffix,
            self.file_times.render(Utc::now())
        )
    }

    /// Deletes temporary files older than the request TTL.
    ///
    /// Runs at most once per sweep gate period; returns `None` when the gate
    /// is closed, otherwise the number of deleted files.
    pub async fn remove_old_export_files(&self) -> Result<Option<usize>, ExportError> {
        if self.transients.get(TMPDATA_CLEARED_TRANSIENT).await?.is_some() {
            debug!("Export files sweep skipped: gate still active");
            return Ok(None);
        }

        let removed = self.sweep_dir(SystemTime::now())?;
        self.transients
            .put(TMPDATA_CLEARED_TRANSIENT, "1", self.sweep_gate_secs)
            .await?;

        if removed > 0 {
            info!(removed = removed, "Removed expired export files");
        }
        Ok(Some(removed))
    }

    fn sweep_dir(&self, now: SystemTime) -> Result<usize, ExportError> {
        let dir = self.tmpdir()?;
        let ttl = Duration::from_secs(self.ttl_secs.max(0) as u64);

        let removed = fs::read_dir(&dir)?
            .filter(|item| sweep_item(item, now, ttl))
            .count();
        Ok(removed)
    }
}

/// Removes one directory entry when it is an expired export file.
///
/// Unreadable entries are logged and left alone.
fn sweep_item(item: &io::Result<DirEntry>, now: SystemTime, ttl: Duration) -> bool {
    let item = match item {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "Skipping unreadable export directory entry");
            return false;
        }
    };
    let name = item.file_name();
    let name = name.to_string_lossy();
    if name.starts_with('.') || name == INDEX_HTML {
        return false;
    }

    let metadata = match item.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(file = %name, error = %e, "Skipping export file without metadata");
            return false;
        }
    };
    if !metadata.is_file() {
        return false;
    }
    let age = metadata
        .modified()
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .unwrap_or_default();
    if age <= ttl {
        return false;
    }

    match fs::remove_file(item.path()) {
        Ok(()) => true,
        Err(e) => {
            warn!(file = %name, error = %e, "Failed to remove expired export file");
            false
        }
    }
}

fn create_if_missing(path: &Path, contents: &str) -> io::Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => file.write_all(contents.as_bytes()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{EntryQuery, ExportArgs, FormData, RequestMethod};
    use domain::services::MemoryTransientStore;
    use tempfile::TempDir;

    fn descriptor(request_id: &str, entry_id: i64) -> RequestDescriptor {
        let args = ExportArgs {
            form_id: 7,
            entry_id,
            ..ExportArgs::empty(RequestMethod::Get)
        };
        RequestDescriptor {
            request_id: request_id.into(),
            form_data: FormData {
                id: 7,
                title: "Contact Us!".into(),
                fields: Vec::new(),
            },
            db_args: EntryQuery::from_args(&args).page(1000, 0),
            fields: Vec::new(),
            additional_info: Vec::new(),
            count: 1,
            step: 0,
            total_steps: 1,
            columns_row: None,
        }
    }

    fn export_file(dir: &TempDir, separator: u8) -> ExportFile {
        ExportFile::new(
            dir.path(),
            separator,
            86_400,
            0.0,
            Arc::new(MemoryTransientStore::new()),
        )
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_tmpdir_is_protected() {
        let dir = TempDir::new().unwrap();
        let tmpdir = export_file(&dir, b',').tmpdir().unwrap();

        assert!(tmpdir.ends_with("export"));
        assert!(tmpdir.join("index.html").exists());
        let htaccess = fs::read_to_string(dir.path().join(".htaccess")).unwrap();
        assert!(htaccess.contains("deny from all"));
    }

    #[test]
    fn test_write_csv_appends_and_quotes() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');
        let descriptor = descriptor("abc123", 0);

        let first = file
            .write_csv(&[row(&["Name", "Note"]), row(&["Ann", "a, \"b\""])], &descriptor)
            .unwrap();
        let second = file.write_csv(&[row(&["Bob", "line\nbreak"])], &descriptor).unwrap();

        assert_eq!(first, 0);
        assert!(second > 0);
        let contents = fs::read_to_string(file.tmpfname(&descriptor).unwrap()).unwrap();
        assert_eq!(
            contents,
            "Name,Note\nAnn,\"a, \"\"b\"\"\"\nBob,\"line\nbreak\"\n"
        );
    }

    #[test]
    fn test_write_csv_uses_separator() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b';');
        let descriptor = descriptor("abc", 0);
        file.write_csv(&[row(&["a", "b;c"])], &descriptor).unwrap();

        let contents = fs::read_to_string(file.tmpfname(&descriptor).unwrap()).unwrap();
        assert_eq!(contents, "a;\"b;c\"\n");
    }

    #[test]
    fn test_truncate_rolls_back_append() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');
        let descriptor = descriptor("abc", 0);
        file.write_csv(&[row(&["header"])], &descriptor).unwrap();
        let mark = file.write_csv(&[row(&["data"])], &descriptor).unwrap();

        file.truncate(&descriptor, mark);

        let contents = fs::read_to_string(file.tmpfname(&descriptor).unwrap()).unwrap();
        assert_eq!(contents, "header\n");
    }

    #[test]
    fn test_output_file_errors() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');

        assert_eq!(file.output_file(None).unwrap_err(), ExportError::UnknownRequest);

        // Touched but never written.
        let empty = descriptor("abc", 0);
        assert_eq!(file.output_file(Some(&empty)).unwrap_err(), ExportError::FileEmpty);

        let blocked = descriptor("dir", 0);
        fs::create_dir_all(file.tmpdir().unwrap().join("dir")).unwrap();
        assert_eq!(
            file.output_file(Some(&blocked)).unwrap_err(),
            ExportError::FileNotReadable
        );
    }

    #[test]
    fn test_output_file_download() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');
        let descriptor = descriptor("abc", 0);
        file.write_csv(&[row(&["Name"]), row(&["Ann"])], &descriptor).unwrap();

        let download = file.output_file(Some(&descriptor)).unwrap();

        assert_eq!(download.len, 9);
        assert!(download.file_name.starts_with("wpforms-7-Contact-Us-"));
        assert!(download.file_name.ends_with(".csv"));
        let headers = download.headers();
        assert!(headers.contains(&("Content-Type", "text/csv".to_string())));
        assert!(headers.contains(&("Content-Transfer-Encoding", "binary".to_string())));
        assert!(headers.contains(&(
            "Content-Disposition",
            format!("attachment; filename={}", download.file_name)
        )));
    }

    #[test]
    fn test_output_file_can_delete_after_download() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',').with_delete_after_download(true);
        let descriptor = descriptor("abc", 0);
        file.write_csv(&[row(&["Name"])], &descriptor).unwrap();
        let path = file.tmpdir().unwrap().join("abc");

        let download = file.output_file(Some(&descriptor)).unwrap();

        assert_eq!(download.len, 5);
        assert!(!path.exists());
    }

    #[test]
    fn test_single_entry_file_name() {
        let dir = TempDir::new().unwrap();
        let name = export_file(&dir, b',').file_name(&descriptor("abc", 42));
        let expected_prefix = "wpforms-7-Contact-Us-entry-42-";
        assert!(name.starts_with(expected_prefix));
        // Y-m-d-H-i-s
        let stamp = &name[expected_prefix.len()..name.len() - ".csv".len()];
        assert_eq!(stamp.len(), 19);
        assert_eq!(stamp.matches('-').count(), 5);
    }

    #[test]
    fn test_sweep_removes_only_expired_files() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');
        let tmpdir = file.tmpdir().unwrap();
        let now = SystemTime::now();

        let old = tmpdir.join("old");
        let fresh = tmpdir.join("fresh");
        let boundary = tmpdir.join("boundary");
        let hidden = tmpdir.join(".hidden");
        for path in [&old, &fresh, &boundary, &hidden] {
            fs::write(path, "x").unwrap();
        }
        let day = Duration::from_secs(86_400);
        let set_mtime = |path: &Path, at: SystemTime| {
            File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(at)
                .unwrap();
        };
        set_mtime(&old, now - day - Duration::from_secs(1));
        set_mtime(&boundary, now - day);
        set_mtime(&hidden, now - day * 2);

        let removed = file.sweep_dir(now).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(boundary.exists());
        assert!(hidden.exists());
        assert!(tmpdir.join("index.html").exists());
    }

    #[test]
    fn test_sweep_skips_unreadable_entries() {
        let dir = TempDir::new().unwrap();
        let file = export_file(&dir, b',');
        let tmpdir = file.tmpdir().unwrap();
        let old = tmpdir.join("old");
        fs::write(&old, "x").unwrap();
        let later = SystemTime::now() + Duration::from_secs(86_400 * 2);
        let ttl = Duration::from_secs(86_400);

        let unreadable: io::Result<DirEntry> =
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(!sweep_item(&unreadable, later, ttl));

        let removed = fs::read_dir(&tmpdir)
            .unwrap()
            .chain(std::iter::once(unreadable))
            .filter(|item| sweep_item(item, later, ttl))
            .count();
        assert_eq!(removed, 1);
        assert!(!old.exists());
    }

    #[tokio::test]
    async fn test_sweep_is_gated() {
        let dir = TempDir::new().unwrap();
        let transients: Arc<dyn TransientStore> = Arc::new(MemoryTransientStore::new());
        let file = ExportFile::new(dir.path(), b',', 0, 0.0, transients.clone());

        assert!(file.remove_old_export_files().await.unwrap().is_some());
        assert!(transients
            .get(TMPDATA_CLEARED_TRANSIENT)
            .await
            .unwrap()
            .is_some());
        assert_eq!(file.remove_old_export_files().await.unwrap(), None);
    }
}

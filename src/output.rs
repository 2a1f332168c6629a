use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Destination for the result files of a run, one writer per output key
/// (e.g. "pv" for period output, "hourly" for the hourly detail).
pub trait Output: Debug {
    fn writer_for_key(&self, key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    /// `file_template` takes the output key in place of `{}`, e.g. `"run_{}.csv"`.
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    pub fn path_for_key(&self, key: &str) -> anyhow::Result<PathBuf> {
        let file_name = formatx!(&self.file_template, key).map_err(|err| {
            anyhow!(
                "Could not fill file template '{}': {err:?}",
                self.file_template
            )
        })?;
        Ok(self.directory_path.join(file_name))
    }
}

impl Output for FileOutput {
    fn writer_for_key(&self, key: &str) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(self.path_for_key(key)?)?))
    }
}

impl Output for &FileOutput {
    fn writer_for_key(&self, key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_key(self, key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_key(&self, _key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

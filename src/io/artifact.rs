//! Versioned binary envelopes for contexts, keys and ciphertexts
//!
//! Layout: `"FEDHE"` magic, u16 LE format version, u8 artifact kind, then a
//! bincode body. Files are published atomically: the bytes go to a
//! temporary file in the destination directory, which is then renamed over
//! the target. A [`Publication`] does the same for a group of files that
//! must appear together or not at all.

use crate::error::{fed_err, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Envelope magic
pub const MAGIC: &[u8; 5] = b"FEDHE";

/// Current envelope format version
pub const FORMAT_VERSION: u16 = 1;

/// Kind byte of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArtifactKind {
    Context = 1,
    PublicKey = 2,
    SecretKey = 3,
    Ciphertext = 4,
}

impl ArtifactKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Context),
            2 => Some(Self::PublicKey),
            3 => Some(Self::SecretKey),
            4 => Some(Self::Ciphertext),
            _ => None,
        }
    }
}

/// Serialize `value` into an envelope at `path`
pub fn write_artifact<T: Serialize>(path: &Path, kind: ArtifactKind, value: &T) -> Result<()> {
    let mut publication = Publication::new();
    publication.stage_artifact(path, kind, value)?;
    publication.commit()
}

/// Write an already serialized body; `owner_only` restricts permissions to 0o600 on Unix
pub fn write_artifact_bytes(
    path: &Path,
    kind: ArtifactKind,
    body: &[u8],
    owner_only: bool,
) -> Result<()> {
    let mut publication = Publication::new();
    publication.stage_artifact_bytes(path, kind, body, owner_only)?;
    publication.commit()
}

/// Read and deserialize an envelope of the given kind
pub fn read_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| fed_err!(Io, "cannot open {}: {e}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 5];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(fed_err!(
            Config,
            "{} is not a fedavg artifact",
            path.display()
        ));
    }

    let version = reader.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(fed_err!(
            Config,
            "{} has format version {version}, expected {FORMAT_VERSION}",
            path.display()
        ));
    }

    let found = reader.read_u8()?;
    if ArtifactKind::from_byte(found) != Some(kind) {
        return Err(fed_err!(
            Config,
            "{} holds artifact kind {found}, expected {:?}",
            path.display(),
            kind
        ));
    }

    Ok(bincode::deserialize_from(reader)?)
}

/// Write through `fill` into a temporary sibling of `path`, then rename it into place
pub fn write_atomic<F>(path: &Path, owner_only: bool, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut publication = Publication::new();
    publication.stage(path, owner_only, fill)?;
    publication.commit()
}

/// Files staged as temporary siblings of their destinations.
///
/// Nothing is visible under a destination name until [`Publication::commit`],
/// which renames every staged file into place. If one rename fails the
/// files already moved are removed again. Dropping an uncommitted
/// publication deletes its temporary files.
#[derive(Debug, Default)]
pub struct Publication {
    staged: Vec<(PathBuf, PathBuf)>,
    obsolete: Vec<PathBuf>,
}

impl Publication {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write through `fill` into a temporary sibling of `path`
    pub fn stage<F>(&mut self, path: &Path, owner_only: bool, fill: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    {
        let tmp = temp_path(path)?;
        let _ = fs::remove_file(&tmp);
        let written = (|| -> std::io::Result<()> {
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            restrict_to_owner(&mut options, owner_only);

            let mut writer = BufWriter::new(options.open(&tmp)?);
            fill(&mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(fed_err!(Io, "cannot write {}: {e}", path.display()));
        }
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Stage `value` as an envelope of `kind`
    pub fn stage_artifact<T: Serialize>(
        &mut self,
        path: &Path,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<()> {
        let body = bincode::serialize(value)?;
        self.stage_artifact_bytes(path, kind, &body, false)
    }

    /// Stage an already serialized envelope body
    pub fn stage_artifact_bytes(
        &mut self,
        path: &Path,
        kind: ArtifactKind,
        body: &[u8],
        owner_only: bool,
    ) -> Result<()> {
        self.stage(path, owner_only, |writer| {
            writer.write_all(MAGIC)?;
            writer.write_u16::<LittleEndian>(FORMAT_VERSION)?;
            writer.write_u8(kind as u8)?;
            writer.write_all(body)
        })
    }

    /// Delete `path` on commit; a file that is already absent is fine
    pub fn remove_on_commit(&mut self, path: &Path) {
        self.obsolete.push(path.to_path_buf());
    }

    /// Move every staged file into place
    pub fn commit(mut self) -> Result<()> {
        for path in &self.obsolete {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(fed_err!(Io, "cannot remove {}: {e}", path.display())),
            }
        }

        let mut pending = std::mem::take(&mut self.staged).into_iter();
        let mut published: Vec<PathBuf> = Vec::new();
        while let Some((tmp, dest)) = pending.next() {
            if let Err(e) = fs::rename(&tmp, &dest) {
                let _ = fs::remove_file(&tmp);
                for (tmp, _) in pending {
                    let _ = fs::remove_file(tmp);
                }
                for path in &published {
                    let _ = fs::remove_file(path);
                }
                return Err(fed_err!(Io, "cannot write {}: {e}", dest.display()));
            }
            published.push(dest);
        }
        Ok(())
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            let _ = fs::remove_file(tmp);
        }
    }
}

#[cfg(unix)]
fn restrict_to_owner(options: &mut OpenOptions, owner_only: bool) {
    use std::os::unix::fs::OpenOptionsExt;
    if owner_only {
        options.mode(0o600);
    }
}

#[cfg(not(unix))]
fn restrict_to_owner(_options: &mut OpenOptions, _owner_only: bool) {}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| fed_err!(Io, "{} is not a file path", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    Ok(path.with_file_name(tmp_name))
}

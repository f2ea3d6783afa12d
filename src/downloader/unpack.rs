//! Archive extraction, one routine per container format.
//!
//! Entry names that are not valid UTF-8 are decoded as EUC-KR (CP949), the
//! encoding Korean Windows archivers write without flagging it. Every entry is
//! joined onto the destination through [`safe_join`], so archives cannot write
//! outside it.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use encoding_rs::EUC_KR;
use tracing::debug;

use crate::app::{Result, SubfeedError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    SevenZ,
}

impl ArchiveFormat {
    /// Format by file extension, case-insensitive.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "tar" => Some(Self::Tar),
            "gz" | "tgz" => Some(Self::TarGz),
            "xz" | "txz" => Some(Self::TarXz),
            "bz2" | "tbz2" => Some(Self::TarBz2),
            "7z" => Some(Self::SevenZ),
            _ => None,
        }
    }

    /// Format from the leading bytes of a file, for downloads whose name
    /// carries no archive extension. Only self-identifying containers are
    /// recognized.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        const ZIP: &[u8] = b"PK\x03\x04";
        const SEVEN_Z: &[u8] = &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C];
        const RAR: &[u8] = b"Rar!\x1a\x07";

        if head.starts_with(ZIP) {
            Some(Self::Zip)
        } else if head.starts_with(SEVEN_Z) {
            Some(Self::SevenZ)
        } else if head.starts_with(RAR) {
            Some(Self::Rar)
        } else {
            None
        }
    }

    pub fn detect(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| {
            SubfeedError::UnsupportedFormat(format!("unrecognized archive: {}", path.display()))
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
            Self::TarBz2 => "tar.bz2",
            Self::SevenZ => "7z",
        }
    }

    /// Directory name for the extracted contents: the file name without its
    /// archive extension (`subs.tar.gz` → `subs`).
    pub fn unpack_dir_name(path: &Path) -> Option<String> {
        let format = Self::from_path(path)?;
        let stem = path.file_stem()?.to_str()?;
        let stem = match format {
            Self::TarGz | Self::TarXz | Self::TarBz2 => stem
                .strip_suffix(".tar")
                .or_else(|| stem.strip_suffix(".TAR"))
                .unwrap_or(stem),
            _ => stem,
        };
        let stem = stem.trim();
        (!stem.is_empty()).then(|| stem.to_string())
    }
}

/// Extracts one archive format into a destination directory.
pub trait Unpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;
}

struct ZipUnpacker;
struct TarUnpacker(Compression);
struct SevenZUnpacker;
struct RarUnpacker;

#[derive(Clone, Copy)]
enum Compression {
    None,
    Gzip,
    Xz,
    Bzip2,
}

static UNPACKERS: &[(ArchiveFormat, &(dyn Unpacker + Sync))] = &[
    (ArchiveFormat::Zip, &ZipUnpacker),
    (ArchiveFormat::Rar, &RarUnpacker),
    (ArchiveFormat::Tar, &TarUnpacker(Compression::None)),
    (ArchiveFormat::TarGz, &TarUnpacker(Compression::Gzip)),
    (ArchiveFormat::TarXz, &TarUnpacker(Compression::Xz)),
    (ArchiveFormat::TarBz2, &TarUnpacker(Compression::Bzip2)),
    (ArchiveFormat::SevenZ, &SevenZUnpacker),
];

fn unpacker_for(format: ArchiveFormat) -> Result<&'static (dyn Unpacker + Sync)> {
    UNPACKERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, unpacker)| *unpacker)
        .ok_or_else(|| SubfeedError::UnsupportedFormat(format.as_str().to_string()))
}

/// Extract `archive` into `dest`, picking the routine from its extension.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let format = ArchiveFormat::detect(archive)?;
    debug!(archive = %archive.display(), format = format.as_str(), "unpacking");
    fs::create_dir_all(dest)?;
    unpacker_for(format)?.unpack(archive, dest)
}

/// Decode a stored entry name: UTF-8 first, then EUC-KR.
pub fn decode_entry_name(raw: &[u8]) -> Result<String> {
    if let Ok(name) = std::str::from_utf8(raw) {
        return Ok(name.to_string());
    }

    EUC_KR
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(Cow::into_owned)
        .ok_or_else(|| SubfeedError::Decode(format!("undecodable entry name: {:?}", raw)))
}

/// Join an archive entry name onto `dest`, rejecting names that would land
/// outside it.
pub fn safe_join(dest: &Path, name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut path = dest.to_path_buf();
    let mut depth = 0;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SubfeedError::InvalidFormat(format!(
                    "entry escapes destination: {}",
                    name
                )));
            }
        }
    }

    if depth == 0 {
        return Err(SubfeedError::InvalidFormat(format!("empty entry name: {:?}", name)));
    }
    Ok(path)
}

impl Unpacker for ZipUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file))?;

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            let name = decode_entry_name(entry.name_raw())?;
            let path = safe_join(dest, &name)?;

            if entry.is_dir() {
                fs::create_dir_all(&path)?;
                continue;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mode = entry.unix_mode();
            let mut out = File::create(&path)?;
            let copied = io::copy(&mut entry, &mut out);
            drop(out);
            drop(entry);
            copied?;

            apply_mode(&path, mode)?;
        }

        Ok(())
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode.map(|m| m & 0o777).filter(|m| *m != 0) {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

impl TarUnpacker {
    fn reader(&self, file: File) -> Box<dyn Read> {
        let file = BufReader::new(file);
        match self.0 {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        }
    }
}

impl Unpacker for TarUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive)?;
        let mut tar = tar::Archive::new(self.reader(file));

        for entry in tar.entries()? {
            let mut entry = entry?;
            let name = decode_entry_name(&entry.path_bytes())?;
            let path = safe_join(dest, &name)?;
            let kind = entry.header().entry_type();

            if kind.is_dir() {
                fs::create_dir_all(&path)?;
            } else if kind.is_file() {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&path)?;
            } else {
                debug!(entry = %name, "skipping non-file tar entry");
            }
        }

        Ok(())
    }
}

impl Unpacker for SevenZUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut failure: Option<SubfeedError> = None;

        sevenz_rust::decompress_file_with_extract_fn(archive, dest, |entry, reader, _| {
            // Blocks keep calling back after a stop, so skip once failed
            if failure.is_some() {
                return Ok(false);
            }
            match extract_7z_entry(entry, reader, dest) {
                Ok(()) => Ok(true),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
        .map_err(|e| {
            SubfeedError::Other(format!("7z extraction of {} failed: {}", archive.display(), e))
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn extract_7z_entry(
    entry: &sevenz_rust::SevenZArchiveEntry,
    reader: &mut dyn Read,
    dest: &Path,
) -> Result<()> {
    let path = safe_join(dest, entry.name())?;

    if entry.is_directory() {
        fs::create_dir_all(&path)?;
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&path)?;
    io::copy(reader, &mut out)?;
    Ok(())
}

impl Unpacker for RarUnpacker {
    fn unpack(&self, archive: &Path, _dest: &Path) -> Result<()> {
        Err(SubfeedError::UnsupportedFormat(format!(
            "rar extraction is not available: {}",
            archive.display()
        )))
    }
}

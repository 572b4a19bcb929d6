//! Windows shell link (`.lnk`) target extraction.
//!
//! Only the LinkInfo local path is read: `LocalBasePath` followed by
//! `CommonPathSuffix`, preferring the Unicode variants when present.
//! Network targets and ID-list-only shortcuts yield no target.

use std::path::PathBuf;

use thiserror::Error;

const HEADER_SIZE: u32 = 0x4C;
const LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_LINK_TARGET_ID_LIST: u32 = 0x0000_0001;
const HAS_LINK_INFO: u32 = 0x0000_0002;
const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x0000_0001;

/// LinkInfo headers this large or larger carry Unicode offsets.
const UNICODE_LINK_INFO_HEADER: u32 = 0x24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortcutError {
    #[error("not a shell link")]
    NotShellLink,

    #[error("shell link truncated at offset {0}")]
    Truncated(usize),
}

/// Local target of a shell link, or `None` when it has no local path.
pub fn parse_target(data: &[u8]) -> Result<Option<PathBuf>, ShortcutError> {
    if read_u32(data, 0)? != HEADER_SIZE || data.get(4..20) != Some(&LINK_CLSID[..]) {
        return Err(ShortcutError::NotShellLink);
    }
    let flags = read_u32(data, 20)?;

    let mut offset = HEADER_SIZE as usize;
    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        offset += 2 + read_u16(data, offset)? as usize;
    }
    if flags & HAS_LINK_INFO == 0 {
        return Ok(None);
    }

    let info = offset;
    let info_size = read_u32(data, info)? as usize;
    let info = data
        .get(info..info + info_size)
        .ok_or(ShortcutError::Truncated(info))?;

    let header_size = read_u32(info, 4)?;
    let info_flags = read_u32(info, 8)?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return Ok(None);
    }

    let target = if header_size >= UNICODE_LINK_INFO_HEADER {
        let base = read_u32(info, 28)? as usize;
        let suffix = read_u32(info, 32)? as usize;
        let mut target = utf16_z(info, base)?;
        target.push_str(&utf16_z(info, suffix)?);
        target
    } else {
        let base = read_u32(info, 16)? as usize;
        let suffix = read_u32(info, 24)? as usize;
        let mut target = ansi_z(info, base)?;
        target.push_str(&ansi_z(info, suffix)?);
        target
    };

    Ok((!target.is_empty()).then(|| PathBuf::from(target)))
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, ShortcutError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(ShortcutError::Truncated(at))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, ShortcutError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ShortcutError::Truncated(at))
}

/// NUL-terminated code-page string; read as lossy UTF-8.
fn ansi_z(data: &[u8], at: usize) -> Result<String, ShortcutError> {
    let rest = data.get(at..).ok_or(ShortcutError::Truncated(at))?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(ShortcutError::Truncated(data.len()))?;
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// NUL-terminated UTF-16LE string.
fn utf16_z(data: &[u8], at: usize) -> Result<String, ShortcutError> {
    let rest = data.get(at..).ok_or(ShortcutError::Truncated(at))?;
    let units: Vec<u16> = rest
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    if units.len() * 2 >= rest.len() {
        return Err(ShortcutError::Truncated(data.len()));
    }
    Ok(String::from_utf16_lossy(&units))
}

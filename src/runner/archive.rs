use std::collections::HashMap;
use std::io::{Cursor, Read};

use super::{ExtractionError, RunnerError};

/// Builds the single-entry tar archive that carries the submitted source
/// into the container workspace.
///
/// The entry content is the UTF-8 byte encoding of the source, untouched.
/// Line-ending normalization is the compile/run command's business, never
/// the injector's.
pub(super) fn pack_source(filename: &str, source_code: &str) -> Result<Vec<u8>, RunnerError> {
    let data = source_code.as_bytes();

    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp() as u64);

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_data(&mut header, filename, data)
        .map_err(RunnerError::SourceArchive)?;

    builder.into_inner().map_err(RunnerError::SourceArchive)
}

/// Reads every regular file in a result archive into memory, keyed by its
/// path inside the archive (e.g. `dist/stdout.txt`).
pub(super) fn unpack_results(archive: &[u8]) -> Result<HashMap<String, Vec<u8>>, ExtractionError> {
    let mut files = HashMap::new();

    let mut tar = tar::Archive::new(Cursor::new(archive));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        files.insert(path, content);
    }

    Ok(files)
}

/// Decodes one captured stream from the unpacked result archive.
///
/// Present: UTF-8 text with trailing whitespace stripped from each line,
/// lines rejoined with `\n`, and the whole text trimmed. Absent: the empty
/// string — a phase that never ran leaves no capture file, and that is not
/// an error. A file that is present but not valid UTF-8 is.
pub(super) fn decode_capture(
    files: &HashMap<String, Vec<u8>>,
    name: &str,
) -> Result<String, ExtractionError> {
    let Some(content) = files.get(name) else {
        return Ok(String::new());
    };

    let text = String::from_utf8(content.clone()).map_err(|source| ExtractionError::Decode {
        file: name.to_string(),
        source,
    })?;

    let joined = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(joined.trim().to_string())
}

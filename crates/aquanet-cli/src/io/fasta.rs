use crate::error::{CliError, Result};
use aquanet::engine::msa::Alignment;
use std::path::Path;

/// Loads an aligned FASTA file into the core's alignment representation.
///
/// The alignment is produced ahead of time by an external tool; this reader
/// only collects (id, gapped row) pairs. Record ids are the first
/// whitespace-separated token of each header.
pub fn load_alignment(path: &Path) -> Result<Alignment> {
    let content = std::fs::read_to_string(path)?;
    let mut rows: Vec<(String, String)> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let id = header
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            rows.push((id, String::new()));
        } else if let Some((_, sequence)) = rows.last_mut() {
            sequence.push_str(line);
        } else {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!("sequence data before the first FASTA header"),
            });
        }
    }

    if rows.is_empty() {
        return Err(CliError::FileParsing {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("no FASTA records found"),
        });
    }
    Ok(Alignment::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn aligned_fasta_loads_with_gaps_preserved() {
        let file = write_temp(">1abc some description\nGAV-\nQ\n>2xyz\n-AVTQ\n");
        let alignment = load_alignment(file.path()).unwrap();
        assert_eq!(alignment.row("1abc"), Some("GAV-Q"));
        assert_eq!(alignment.row("2xyz"), Some("-AVTQ"));
    }

    #[test]
    fn headerless_content_is_rejected() {
        let file = write_temp("GAVTQ\n");
        assert!(load_alignment(file.path()).is_err());
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = write_temp("");
        assert!(load_alignment(file.path()).is_err());
    }
}

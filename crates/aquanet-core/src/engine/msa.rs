use crate::core::models::frame::Frame;
use crate::engine::error::AnalysisError;
use std::collections::BTreeMap;
use tracing::info;

/// Three-letter to one-letter residue codes, including common protonation
/// variants.
static ONE_LETTER_CODES: phf::Map<&'static str, char> = phf::phf_map! {
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
    "HIE" => 'H', "HID" => 'H', "HIP" => 'H', "CYX" => 'C', "ASH" => 'D',
    "GLH" => 'E', "LYN" => 'K',
};

const GAP_CHARS: [char; 2] = ['-', '.'];

/// One structure's protein residue sequence: ordered (residue id, one-letter
/// code) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueSequence {
    residues: Vec<(isize, char)>,
}

impl ResidueSequence {
    pub fn new(residues: Vec<(isize, char)>) -> Self {
        Self { residues }
    }

    /// Extracts the protein sequence from a frame, in residue order of first
    /// appearance. Waters and non-protein residues are skipped; unknown
    /// residue names become 'X'.
    pub fn from_frame(frame: &Frame) -> Self {
        let mut residues = Vec::new();
        let mut last: Option<(char, isize)> = None;
        for atom in frame.atoms() {
            if atom.is_water() {
                continue;
            }
            let key = (atom.chain_id, atom.residue_id);
            if last == Some(key) {
                continue;
            }
            if ONE_LETTER_CODES.contains_key(atom.residue_name.as_str())
                || atom.residue_name.len() == 3
            {
                let code = ONE_LETTER_CODES
                    .get(atom.residue_name.as_str())
                    .copied()
                    .unwrap_or('X');
                residues.push((atom.residue_id, code));
                last = Some(key);
            }
        }
        Self { residues }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// The one-letter codes as a string.
    pub fn letters(&self) -> String {
        self.residues.iter().map(|(_, c)| *c).collect()
    }

    pub fn residues(&self) -> &[(isize, char)] {
        &self.residues
    }
}

/// A multiple sequence alignment: one gapped row per structure.
///
/// The alignment is an immutable external artifact (produced by an alignment
/// tool ahead of the run); it is validated once against each structure's own
/// sequence and trusted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alignment {
    rows: Vec<(String, String)>,
}

impl Alignment {
    pub fn new(rows: Vec<(String, String)>) -> Self {
        Self { rows }
    }

    pub fn row(&self, structure: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(id, _)| id == structure)
            .map(|(_, row)| row.as_str())
    }
}

/// Maps (structure id, residue id) to 1-indexed alignment columns and back.
///
/// Built once per run and shared read-only by aggregation and
/// classification. A column maps to at most one residue per structure; a
/// residue aligned to a gap in another structure simply has no counterpart
/// there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentColumnMap {
    residue_to_column: BTreeMap<String, BTreeMap<isize, usize>>,
    column_to_residue: BTreeMap<String, BTreeMap<usize, isize>>,
}

impl AlignmentColumnMap {
    /// Alignment column of a residue, if the structure is mapped and the
    /// residue is not aligned to a gap.
    pub fn column_of(&self, structure: &str, residue_id: isize) -> Option<usize> {
        self.residue_to_column
            .get(structure)?
            .get(&residue_id)
            .copied()
    }

    /// Residue id occupying a column in a structure, if any.
    pub fn residue_at(&self, structure: &str, column: usize) -> Option<isize> {
        self.column_to_residue.get(structure)?.get(&column).copied()
    }

    /// Structures represented in the map.
    pub fn structures(&self) -> impl Iterator<Item = &str> {
        self.residue_to_column.keys().map(String::as_str)
    }

    /// Merges another map's structures into this one. Later entries win on
    /// duplicate structure ids.
    pub fn absorb(&mut self, other: AlignmentColumnMap) {
        self.residue_to_column.extend(other.residue_to_column);
        self.column_to_residue.extend(other.column_to_residue);
    }
}

/// Builds the column map from per-structure sequences and their alignment
/// rows.
///
/// # Errors
///
/// [`AnalysisError::AlignmentMismatch`] when a structure has no alignment
/// row, or its degapped row disagrees with the sequence derived from the
/// structure's own residues.
pub fn build_column_map(
    sequences: &BTreeMap<String, ResidueSequence>,
    alignment: &Alignment,
) -> Result<AlignmentColumnMap, AnalysisError> {
    let mut map = AlignmentColumnMap::default();

    for (structure, sequence) in sequences {
        let row = alignment
            .row(structure)
            .ok_or_else(|| AnalysisError::AlignmentMismatch {
                structure: structure.clone(),
                detail: "no alignment row for structure".to_string(),
            })?;

        let degapped: String = row.chars().filter(|c| !GAP_CHARS.contains(c)).collect();
        if degapped.to_ascii_uppercase() != sequence.letters().to_ascii_uppercase() {
            return Err(AnalysisError::AlignmentMismatch {
                structure: structure.clone(),
                detail: format!(
                    "alignment row ({} residues) does not match structure sequence ({} residues)",
                    degapped.len(),
                    sequence.len()
                ),
            });
        }

        let mut forward = BTreeMap::new();
        let mut reverse = BTreeMap::new();
        let mut residues = sequence.residues().iter();
        for (offset, symbol) in row.chars().enumerate() {
            if GAP_CHARS.contains(&symbol) {
                continue;
            }
            let column = offset + 1;
            let &(residue_id, _) = residues
                .next()
                .expect("degapped row length equals sequence length");
            forward.insert(residue_id, column);
            reverse.insert(column, residue_id);
        }

        map.residue_to_column.insert(structure.clone(), forward);
        map.column_to_residue.insert(structure.clone(), reverse);
    }

    info!(
        structures = sequences.len(),
        "alignment column map constructed"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn sequences() -> BTreeMap<String, ResidueSequence> {
        BTreeMap::from([
            (
                "1abc".to_string(),
                ResidueSequence::new(vec![(10, 'G'), (11, 'A'), (12, 'V')]),
            ),
            (
                "2xyz".to_string(),
                ResidueSequence::new(vec![(7, 'A'), (8, 'V')]),
            ),
        ])
    }

    #[test]
    fn map_round_trips_for_non_gap_residues() {
        let alignment = Alignment::new(vec![
            ("1abc".to_string(), "GAV".to_string()),
            ("2xyz".to_string(), "-AV".to_string()),
        ]);
        let map = build_column_map(&sequences(), &alignment).unwrap();

        for (structure, sequence) in sequences() {
            for &(residue_id, _) in sequence.residues() {
                let column = map.column_of(&structure, residue_id).unwrap();
                assert_eq!(map.residue_at(&structure, column), Some(residue_id));
            }
        }
    }

    #[test]
    fn gap_columns_have_no_residue() {
        let alignment = Alignment::new(vec![
            ("1abc".to_string(), "GAV".to_string()),
            ("2xyz".to_string(), "-AV".to_string()),
        ]);
        let map = build_column_map(&sequences(), &alignment).unwrap();
        assert_eq!(map.residue_at("2xyz", 1), None);
        assert_eq!(map.residue_at("2xyz", 2), Some(7));
        assert_eq!(map.column_of("1abc", 10), Some(1));
    }

    #[test]
    fn mismatched_row_is_rejected() {
        let alignment = Alignment::new(vec![
            ("1abc".to_string(), "GGV".to_string()),
            ("2xyz".to_string(), "-AV".to_string()),
        ]);
        let err = build_column_map(&sequences(), &alignment).unwrap_err();
        assert!(matches!(err, AnalysisError::AlignmentMismatch { .. }));
    }

    #[test]
    fn missing_row_is_rejected() {
        let alignment = Alignment::new(vec![("1abc".to_string(), "GAV".to_string())]);
        let err = build_column_map(&sequences(), &alignment).unwrap_err();
        match err {
            AnalysisError::AlignmentMismatch { structure, .. } => {
                assert_eq!(structure, "2xyz")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn sequence_extraction_skips_waters_and_repeats() {
        let frame = Frame::new(
            0,
            vec![
                Atom::new(1, "N", "N", 5, "GLY", 'A', Point3::origin()),
                Atom::new(2, "CA", "C", 5, "GLY", 'A', Point3::origin()),
                Atom::new(3, "N", "N", 6, "ALA", 'A', Point3::origin()),
                Atom::new(4, "O", "O", 100, "HOH", 'W', Point3::origin()),
            ],
        );
        let sequence = ResidueSequence::from_frame(&frame);
        assert_eq!(sequence.letters(), "GA");
        assert_eq!(sequence.residues(), &[(5, 'G'), (6, 'A')]);
    }
}

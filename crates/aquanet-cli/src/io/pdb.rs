use aquanet::core::models::atom::{Atom, AtomRole};
use aquanet::core::models::frame::{Frame, FrameAccessError, FrameSource};
use nalgebra::Point3;
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("File contains no ATOM or HETATM records")]
    Empty,
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for an ATOM/HETATM record (needs coordinate columns)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

/// A PDB-backed frame source.
///
/// Multi-model files (MODEL/ENDMDL) become trajectories, one frame per
/// model; files without model records yield a single static frame. This is
/// the realized external collaborator behind the core's `FrameSource`
/// boundary: the library itself never touches file formats.
#[derive(Debug, Clone)]
pub struct PdbTrajectory {
    frames: Vec<Frame>,
}

impl PdbTrajectory {
    /// Reads a PDB file, optionally recognizing an extra water residue name
    /// on top of the built-in vocabulary.
    pub fn load(path: &Path, water_name: Option<&str>) -> Result<Self, PdbError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(&mut io::BufReader::new(file), water_name)
    }

    pub fn read_from(
        reader: &mut impl BufRead,
        water_name: Option<&str>,
    ) -> Result<Self, PdbError> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut buffer: Vec<Atom> = Vec::new();

        for (line_index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line_num = line_index + 1;
            let record = slice_and_trim(&line, 0, 6);

            match record {
                "ATOM" | "HETATM" => {
                    buffer.push(parse_atom_line(&line, line_num, water_name)?);
                }
                "ENDMDL" => {
                    if !buffer.is_empty() {
                        frames.push(Frame::new(frames.len(), std::mem::take(&mut buffer)));
                    }
                }
                _ => {}
            }
        }

        if !buffer.is_empty() {
            frames.push(Frame::new(frames.len(), buffer));
        }
        if frames.is_empty() {
            return Err(PdbError::Empty);
        }
        Ok(Self { frames })
    }
}

fn parse_atom_line(
    line: &str,
    line_num: usize,
    water_name: Option<&str>,
) -> Result<Atom, PdbError> {
    if line.len() < 54 {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let parse_int = |start: usize, end: usize| -> Result<isize, PdbError> {
        let value = slice_and_trim(line, start, end);
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidInt {
                columns: format!("{}-{}", start + 1, end),
                value: value.to_string(),
            },
        })
    };
    let parse_float = |start: usize, end: usize| -> Result<f64, PdbError> {
        let value = slice_and_trim(line, start, end);
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidFloat {
                columns: format!("{}-{}", start + 1, end),
                value: value.to_string(),
            },
        })
    };

    let serial = parse_int(6, 11)? as usize;
    let name = slice_and_trim(line, 12, 16);
    let residue_name = slice_and_trim(line, 17, 20);
    let chain_id = line.chars().nth(21).filter(|c| !c.is_whitespace()).unwrap_or('A');
    let residue_id = parse_int(22, 26)?;
    let x = parse_float(30, 38)?;
    let y = parse_float(38, 46)?;
    let z = parse_float(46, 54)?;
    let element = slice_and_trim(line, 76, 78);

    let mut atom = Atom::new(
        serial,
        name,
        element,
        residue_id,
        residue_name,
        chain_id,
        Point3::new(x, y, z),
    );
    if water_name.is_some_and(|custom| custom.eq_ignore_ascii_case(residue_name)) {
        atom.role = AtomRole::Water;
    }
    Ok(atom)
}

impl FrameSource for PdbTrajectory {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<Frame, FrameAccessError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| FrameAccessError {
                index,
                message: format!("model index out of range (have {})", self.frames.len()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const STATIC_PDB: &str = "\
ATOM      1  N   GLY A  10      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  GLY A  10      11.639   6.071  -5.147  1.00  0.00           C
HETATM    3  O   HOH W 101       8.000   6.000  -6.000  1.00  0.00           O
";

    const MULTI_MODEL_PDB: &str = "\
MODEL        1
HETATM    1  O   HOH W 101       0.000   0.000   0.000  1.00  0.00           O
ENDMDL
MODEL        2
HETATM    1  O   HOH W 101       0.500   0.000   0.000  1.00  0.00           O
ENDMDL
";

    #[test]
    fn static_file_becomes_one_frame() {
        let traj = PdbTrajectory::read_from(&mut Cursor::new(STATIC_PDB), None).unwrap();
        assert_eq!(traj.len(), 1);
        let frame = traj.frame(0).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.waters().len(), 1);

        let nitrogen = frame.atom_by_serial(1).unwrap();
        assert_eq!(nitrogen.name, "N");
        assert_eq!(nitrogen.residue_id, 10);
        assert_eq!(nitrogen.chain_id, 'A');
        assert!((nitrogen.position.x - 11.104).abs() < 1e-9);
    }

    #[test]
    fn models_become_separate_frames() {
        let traj = PdbTrajectory::read_from(&mut Cursor::new(MULTI_MODEL_PDB), None).unwrap();
        assert_eq!(traj.len(), 2);
        let second = traj.frame(1).unwrap();
        assert_eq!(second.index, 1);
        assert!((second.atoms()[0].position.x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn custom_water_name_is_recognized() {
        let text = "\
HETATM    1  O   W99 W 101       0.000   0.000   0.000  1.00  0.00           O
";
        let traj = PdbTrajectory::read_from(&mut Cursor::new(text), Some("W99")).unwrap();
        let frame = traj.frame(0).unwrap();
        assert_eq!(frame.waters().len(), 1);
    }

    #[test]
    fn short_line_reports_line_number() {
        let text = "ATOM      1  N   GLY A  10
";
        let err = PdbTrajectory::read_from(&mut Cursor::new(text), None).unwrap_err();
        assert!(matches!(
            err,
            PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::LineTooShort
            }
        ));
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = PdbTrajectory::read_from(&mut Cursor::new("REMARK only\n"), None).unwrap_err();
        assert!(matches!(err, PdbError::Empty));
    }
}

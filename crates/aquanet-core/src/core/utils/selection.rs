use crate::core::models::atom::Atom;
use crate::core::models::frame::Frame;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when a selection does not resolve to exactly one atom.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("selection '{selection}' resolved to {matched} atoms, expected exactly 1")]
pub struct SelectionError {
    /// Textual form of the failing selection.
    pub selection: String,
    /// How many atoms the selection matched.
    pub matched: usize,
}

/// An atom-selection expression that must resolve to exactly one atom.
///
/// Used for the active-site reference and for classifier reference residues.
/// Resolution happens against a concrete frame, so the same expression works
/// across trajectories where serials are stable but positions move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomSelection {
    /// Select by atom serial number.
    Serial(usize),
    /// Select by residue number and atom name (e.g., residue 70, atom CA).
    ResidueAtom { residue_id: isize, atom_name: String },
}

impl AtomSelection {
    /// Resolves the selection against a frame.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError`] if zero or more than one atom matches.
    pub fn resolve_one<'f>(&self, frame: &'f Frame) -> Result<&'f Atom, SelectionError> {
        let matches: Vec<&Atom> = match self {
            AtomSelection::Serial(serial) => {
                frame.atom_by_serial(*serial).into_iter().collect()
            }
            AtomSelection::ResidueAtom {
                residue_id,
                atom_name,
            } => frame
                .atoms()
                .iter()
                .filter(|a| a.residue_id == *residue_id && a.name == *atom_name)
                .collect(),
        };

        match matches.as_slice() {
            [single] => Ok(single),
            _ => Err(SelectionError {
                selection: self.to_string(),
                matched: matches.len(),
            }),
        }
    }
}

impl fmt::Display for AtomSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomSelection::Serial(serial) => write!(f, "serial {}", serial),
            AtomSelection::ResidueAtom {
                residue_id,
                atom_name,
            } => write!(f, "resid {} and name {}", residue_id, atom_name),
        }
    }
}

impl FromStr for AtomSelection {
    type Err = SelectionError;

    /// Parses selections of the form `serial N` or `resid N and name XX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SelectionError {
            selection: s.to_string(),
            matched: 0,
        };

        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            ["serial", n] => {
                let serial = n.parse().map_err(|_| invalid())?;
                Ok(AtomSelection::Serial(serial))
            }
            ["resid", n, "and", "name", name] => {
                let residue_id = n.parse().map_err(|_| invalid())?;
                Ok(AtomSelection::ResidueAtom {
                    residue_id,
                    atom_name: name.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

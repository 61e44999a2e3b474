use super::atom::Atom;
use std::collections::HashMap;
use thiserror::Error;

/// A water molecule resolved within one frame.
///
/// Indices refer into the owning frame's atom list, not atom serials. The
/// hydrogen list is empty when the source structure does not model hydrogens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterMolecule {
    /// Index of the oxygen atom in the frame.
    pub oxygen: usize,
    /// Indices of the attached hydrogen atoms, if present.
    pub hydrogens: Vec<usize>,
    /// Residue sequence number of the water.
    pub residue_id: isize,
    /// Chain identifier of the water.
    pub chain_id: char,
}

/// One structural snapshot: a fixed set of atoms with 3D coordinates.
///
/// Frames are the unit of work for the analysis pipeline. Atoms are stored in
/// ascending serial order so that every downstream iteration is
/// deterministic. Water molecules are grouped once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based index of this frame within its trajectory.
    pub index: usize,
    atoms: Vec<Atom>,
    serial_index: HashMap<usize, usize>,
    waters: Vec<WaterMolecule>,
}

impl Frame {
    /// Builds a frame from a set of atoms.
    ///
    /// Atoms are sorted by serial number and water molecules are grouped by
    /// (chain, residue). Duplicate serials keep the last occurrence.
    pub fn new(index: usize, mut atoms: Vec<Atom>) -> Self {
        atoms.sort_by_key(|a| a.serial);

        let serial_index: HashMap<usize, usize> = atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.serial, i))
            .collect();

        let waters = group_waters(&atoms);

        Self {
            index,
            atoms,
            serial_index,
            waters,
        }
    }

    /// All atoms of the frame, in ascending serial order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms in the frame.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Returns `true` if the frame contains no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Looks up an atom by its serial number.
    pub fn atom_by_serial(&self, serial: usize) -> Option<&Atom> {
        self.serial_index.get(&serial).map(|&i| &self.atoms[i])
    }

    /// The water molecules of the frame, grouped at construction.
    pub fn waters(&self) -> &[WaterMolecule] {
        &self.waters
    }

    /// Iterates over non-water polar heavy atoms (the protein side of
    /// water–protein hydrogen bonds).
    pub fn polar_protein_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms
            .iter()
            .filter(|a| !a.is_water() && a.is_polar_heavy())
    }

    /// Iterates over non-water hydrogen atoms.
    pub fn protein_hydrogens(&self) -> impl Iterator<Item = &Atom> {
        self.atoms
            .iter()
            .filter(|a| !a.is_water() && a.is_hydrogen())
    }
}

fn group_waters(atoms: &[Atom]) -> Vec<WaterMolecule> {
    let mut by_residue: Vec<((char, isize), WaterMolecule)> = Vec::new();
    let mut lookup: HashMap<(char, isize), usize> = HashMap::new();

    for (i, atom) in atoms.iter().enumerate() {
        if !atom.is_water() {
            continue;
        }
        let key = (atom.chain_id, atom.residue_id);
        let slot = *lookup.entry(key).or_insert_with(|| {
            by_residue.push((
                key,
                WaterMolecule {
                    oxygen: usize::MAX,
                    hydrogens: Vec::new(),
                    residue_id: atom.residue_id,
                    chain_id: atom.chain_id,
                },
            ));
            by_residue.len() - 1
        });

        let water = &mut by_residue[slot].1;
        if atom.is_hydrogen() {
            water.hydrogens.push(i);
        } else if atom.is_polar_heavy() {
            water.oxygen = i;
        }
    }

    // Waters without a resolved oxygen cannot participate in the network.
    by_residue
        .into_iter()
        .map(|(_, w)| w)
        .filter(|w| w.oxygen != usize::MAX)
        .collect()
}

/// Error raised when a frame cannot be fetched from a [`FrameSource`].
#[derive(Debug, Error)]
#[error("failed to fetch frame {index}: {message}")]
pub struct FrameAccessError {
    /// Index of the frame that could not be produced.
    pub index: usize,
    /// Human-readable cause, supplied by the source implementation.
    pub message: String,
}

/// A random-access supplier of structural snapshots.
///
/// Implementations live outside the core (file readers, in-memory test
/// fixtures). Random access is required because frames are processed out of
/// order by parallel workers; implementations backed by sequential formats
/// must support replay.
pub trait FrameSource {
    /// Total number of frames available.
    fn len(&self) -> usize;

    /// Returns `true` if the source holds no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the frame at `index`.
    fn frame(&self, index: usize) -> Result<Frame, FrameAccessError>;
}

/// A [`FrameSource`] over frames already resident in memory.
///
/// The standard source for static structures (one frame) and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFrames {
    frames: Vec<Frame>,
}

impl InMemoryFrames {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

impl FrameSource for InMemoryFrames {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Result<Frame, FrameAccessError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| FrameAccessError {
                index,
                message: format!("index out of range (have {})", self.frames.len()),
            })
    }
}

use nalgebra::Point3;
use serde::Serialize;
use std::str::FromStr;

/// Residue names recognized as water molecules.
///
/// These cover the common conventions of crystallographic and simulation
/// pipelines (PDB, GROMACS, AMBER). A user-supplied override name is handled
/// at the frame-construction boundary, not here.
static WATER_RESIDUE_NAMES: phf::Set<&'static str> = phf::phf_set! {
    "HOH", "WAT", "SOL", "H2O", "TIP3", "TIP4", "SPC",
};

/// Elements whose atoms can donate or accept hydrogen bonds.
static POLAR_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "N", "O", "S", "P",
};

/// Protein atom names that belong to the peptide backbone.
static BACKBONE_ATOM_NAMES: phf::Set<&'static str> = phf::phf_set! {
    "N", "CA", "C", "O", "OXT", "H", "HA", "H1", "H2", "H3",
};

/// Represents the structural role of an atom within a molecular system.
///
/// This enum categorizes atoms by where they sit in the structure, which the
/// analysis uses both to decide network membership (water vs. protein) and to
/// tag water–protein hydrogen bonds as backbone- or side-chain-mediated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub enum AtomRole {
    /// Backbone atom, part of the main chain in proteins (e.g., C, N, O, CA).
    Backbone,
    /// Sidechain atom, part of the side groups attached to the backbone.
    Sidechain,
    /// Water molecule atom.
    Water,
    /// Unknown or unclassified atom role (ions, ligands, other solvent).
    #[default]
    Other,
}

/// Classifies an atom's possible participation in a hydrogen bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum HBondRole {
    /// A polar heavy atom (N, O, S, P) that can donate or accept.
    PolarHeavy,
    /// A hydrogen atom, relevant only when hydrogens are modeled explicitly.
    Hydrogen,
    /// An atom that never participates in hydrogen bonds (e.g., carbon).
    #[default]
    Inert,
}

/// Represents an atom in a structural snapshot.
///
/// Atoms are immutable per frame: for trajectories they are re-created for
/// each frame, for static structures they persist for the run. The role and
/// hydrogen-bond classification are derived once at construction so the
/// per-frame pipeline never re-inspects names.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number of the atom, unique within a frame.
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "N", "OW").
    pub name: String,
    /// The chemical element symbol (e.g., "O", "H", "N").
    pub element: String,
    /// The author-assigned residue sequence number this atom belongs to.
    pub residue_id: isize,
    /// The residue name (e.g., "GLY", "HOH").
    pub residue_name: String,
    /// Single-character chain identifier.
    pub chain_id: char,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// The structural role of the atom.
    pub role: AtomRole,
    /// The hydrogen-bond participation class of the atom.
    pub hbond_role: HBondRole,
}

impl Atom {
    /// Creates a new `Atom`, deriving its role and hydrogen-bond class.
    ///
    /// # Arguments
    ///
    /// * `serial` - Serial number, unique within the frame.
    /// * `name` - The atom name.
    /// * `element` - The element symbol; pass an empty string to infer it
    ///   from the atom name.
    /// * `residue_id` - Residue sequence number.
    /// * `residue_name` - Residue name, used for water recognition.
    /// * `chain_id` - Chain identifier.
    /// * `position` - The 3D coordinates in Angstroms.
    pub fn new(
        serial: usize,
        name: &str,
        element: &str,
        residue_id: isize,
        residue_name: &str,
        chain_id: char,
        position: Point3<f64>,
    ) -> Self {
        let element = if element.is_empty() {
            element_from_name(name)
        } else {
            element.to_ascii_uppercase()
        };

        let role = if is_water_residue(residue_name) {
            AtomRole::Water
        } else if BACKBONE_ATOM_NAMES.contains(name) {
            AtomRole::Backbone
        } else {
            AtomRole::Sidechain
        };

        let hbond_role = if element == "H" {
            HBondRole::Hydrogen
        } else if POLAR_ELEMENTS.contains(element.as_str()) {
            HBondRole::PolarHeavy
        } else {
            HBondRole::Inert
        };

        Self {
            serial,
            name: name.to_string(),
            element,
            residue_id,
            residue_name: residue_name.to_string(),
            chain_id,
            position,
            role,
            hbond_role,
        }
    }

    /// Returns `true` if this atom belongs to a water molecule.
    pub fn is_water(&self) -> bool {
        self.role == AtomRole::Water
    }

    /// Returns `true` if this atom is a hydrogen.
    pub fn is_hydrogen(&self) -> bool {
        self.hbond_role == HBondRole::Hydrogen
    }

    /// Returns `true` if this atom is a polar heavy atom able to donate or
    /// accept a hydrogen bond.
    pub fn is_polar_heavy(&self) -> bool {
        self.hbond_role == HBondRole::PolarHeavy
    }
}

/// Returns `true` if `residue_name` is a recognized water residue name.
pub fn is_water_residue(residue_name: &str) -> bool {
    WATER_RESIDUE_NAMES.contains(residue_name.to_ascii_uppercase().as_str())
}

/// Infers the element symbol from an atom name.
///
/// The first alphabetic character of the name is taken as the element. This
/// matches the common single-letter convention of biomolecular atom names
/// (N, CA, OW, HB2) and is only a fallback for inputs that omit the element
/// field.
pub fn element_from_name(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

impl FromStr for AtomRole {
    type Err = ();

    /// Parses a string into an `AtomRole`.
    ///
    /// Case-insensitive; supports common variations (e.g., "side-chain" or
    /// "side_chain").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backbone" => Ok(AtomRole::Backbone),
            "sidechain" | "side-chain" | "side_chain" => Ok(AtomRole::Sidechain),
            "water" => Ok(AtomRole::Water),
            "other" | "unknown" => Ok(AtomRole::Other),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn make(name: &str, element: &str, residue_name: &str) -> Atom {
        Atom::new(1, name, element, 42, residue_name, 'A', Point3::origin())
    }

    #[test]
    fn water_oxygen_is_classified_as_water_polar_heavy() {
        let atom = make("O", "O", "HOH");
        assert_eq!(atom.role, AtomRole::Water);
        assert_eq!(atom.hbond_role, HBondRole::PolarHeavy);
        assert!(atom.is_water());
        assert!(atom.is_polar_heavy());
    }

    #[test]
    fn backbone_nitrogen_is_classified_as_backbone() {
        let atom = make("N", "N", "GLY");
        assert_eq!(atom.role, AtomRole::Backbone);
        assert!(atom.is_polar_heavy());
    }

    #[test]
    fn sidechain_hydroxyl_is_classified_as_sidechain() {
        let atom = make("OG", "O", "SER");
        assert_eq!(atom.role, AtomRole::Sidechain);
        assert!(atom.is_polar_heavy());
    }

    #[test]
    fn carbon_does_not_participate_in_hydrogen_bonds() {
        let atom = make("CB", "C", "ALA");
        assert_eq!(atom.hbond_role, HBondRole::Inert);
        assert!(!atom.is_polar_heavy());
        assert!(!atom.is_hydrogen());
    }

    #[test]
    fn hydrogen_is_recognized_by_element() {
        let atom = make("HB2", "H", "ALA");
        assert!(atom.is_hydrogen());
    }

    #[test]
    fn element_is_inferred_from_name_when_missing() {
        let atom = make("OW", "", "SOL");
        assert_eq!(atom.element, "O");
        assert!(atom.is_polar_heavy());
    }

    #[test]
    fn water_residue_names_are_case_insensitive() {
        assert!(is_water_residue("HOH"));
        assert!(is_water_residue("wat"));
        assert!(is_water_residue("Sol"));
        assert!(!is_water_residue("GLY"));
    }

    #[test]
    fn from_str_parses_valid_roles() {
        assert_eq!(AtomRole::from_str("backbone"), Ok(AtomRole::Backbone));
        assert_eq!(AtomRole::from_str("side-chain"), Ok(AtomRole::Sidechain));
        assert_eq!(AtomRole::from_str("WATER"), Ok(AtomRole::Water));
        assert_eq!(AtomRole::from_str("unknown"), Ok(AtomRole::Other));
        assert_eq!(AtomRole::from_str("foo"), Err(()));
    }
}

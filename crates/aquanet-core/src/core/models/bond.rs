use super::atom::AtomRole;
use serde::Serialize;

/// The class of a detected connection, by the kinds of partners involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionKind {
    /// Both partners are water molecules.
    WaterWater,
    /// One partner is water, the other a protein atom.
    WaterProtein,
}

/// A single accepted hydrogen bond between two atoms of one frame.
///
/// The bond references atoms by serial number. In distance-only mode the pair
/// is unordered and `hydrogen`/`angle` are absent; in angle-aware mode the
/// bond is directed donor → acceptor and records the mediating hydrogen and
/// the donor–hydrogen–acceptor angle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydrogenBond {
    /// Serial of the donor heavy atom (or the lower-serial partner when
    /// direction is not resolved).
    pub donor: usize,
    /// Serial of the acceptor heavy atom (or the higher-serial partner when
    /// direction is not resolved).
    pub acceptor: usize,
    /// Serial of the mediating hydrogen, when hydrogens are modeled.
    pub hydrogen: Option<usize>,
    /// Heavy-atom separation in Angstroms.
    pub distance: f64,
    /// Donor–hydrogen–acceptor angle in degrees, when hydrogens are modeled.
    pub angle: Option<f64>,
    /// Whether the donor → acceptor direction is meaningful.
    pub directed: bool,
    /// Partner classes of the bond.
    pub kind: ConnectionKind,
    /// For water–protein bonds, whether the protein partner is a backbone or
    /// side-chain atom.
    pub partner_role: Option<AtomRole>,
    /// Residue ids of the two partners, in (donor, acceptor) order.
    pub residues: (isize, isize),
}

impl HydrogenBond {
    /// Returns the canonical unordered node pair, lower serial first.
    pub fn canonical_pair(&self) -> (usize, usize) {
        if self.donor <= self.acceptor {
            (self.donor, self.acceptor)
        } else {
            (self.acceptor, self.donor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_orders_by_serial() {
        let bond = HydrogenBond {
            donor: 9,
            acceptor: 4,
            hydrogen: None,
            distance: 2.8,
            angle: None,
            directed: false,
            kind: ConnectionKind::WaterWater,
            partner_role: None,
            residues: (1, 2),
        };
        assert_eq!(bond.canonical_pair(), (4, 9));
    }
}

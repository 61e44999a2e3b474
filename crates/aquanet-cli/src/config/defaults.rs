/// Hydrogen-bond heavy-atom cutoff, Angstroms.
pub const DEFAULT_MAX_DISTANCE: f64 = 3.3;

/// Active-site sphere radius around the reference atom, Angstroms.
pub const DEFAULT_ACTIVE_SITE_RADIUS: f64 = 8.0;

/// Minimum samples per conserved water site.
pub const DEFAULT_MIN_CLUSTER_SAMPLES: usize = 15;

/// Parallel frame workers.
pub const DEFAULT_WORKERS: usize = 4;

//! Clustering over arbitrary unit sets.
//!
//! Two algorithms with different accuracy/cost trade-offs: greedy
//! nearest-cluster assignment for cheap approximate blobs, and DBSCAN-style
//! density clustering with outlier detection where false merges are
//! unacceptable (resource fields). The density clusterer owns its working
//! storage and reuses it across per-tick invocations.

use glam::Vec2;

use crate::unit::Unit;

/// A grown-only set of units with a running weighted position sum, so the
/// center of mass is computed lazily.
#[derive(Debug, Clone)]
pub struct Cluster<'a> {
    units: Vec<&'a Unit>,
    sum: Vec2,
    weight: f32,
}

impl<'a> Cluster<'a> {
    fn new() -> Self {
        Self {
            units: Vec::new(),
            sum: Vec2::ZERO,
            weight: 0.0,
        }
    }

    fn add(&mut self, unit: &'a Unit, weight: f32) {
        self.units.push(unit);
        self.sum += unit.pos * weight;
        self.weight += weight;
    }

    pub fn center(&self) -> Vec2 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            Vec2::ZERO
        }
    }

    pub fn units(&self) -> &[&'a Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Greedy nearest-cluster assignment: each unit joins the closest existing
/// cluster whose centroid lies within `radius`, else founds a new one.
/// Deterministic given arrival order; O(n * clusters).
pub fn cluster_greedy<'a, I>(units: I, radius: f32) -> Vec<Cluster<'a>>
where
    I: IntoIterator<Item = &'a Unit>,
{
    cluster_greedy_weighted(units, radius, |_| 1.0)
}

/// Greedy clustering with a per-unit centroid weight.
pub fn cluster_greedy_weighted<'a, I, W>(units: I, radius: f32, weight: W) -> Vec<Cluster<'a>>
where
    I: IntoIterator<Item = &'a Unit>,
    W: Fn(&Unit) -> f32,
{
    let radius_sq = radius * radius;
    let mut clusters: Vec<Cluster<'a>> = Vec::new();
    for unit in units {
        let mut best: Option<(usize, f32)> = None;
        for (i, cluster) in clusters.iter().enumerate() {
            let d2 = cluster.center().distance_squared(unit.pos);
            if d2 <= radius_sq && best.map_or(true, |(_, bd2)| d2 < bd2) {
                best = Some((i, d2));
            }
        }
        match best {
            Some((i, _)) => clusters[i].add(unit, weight(unit)),
            None => {
                let mut cluster = Cluster::new();
                cluster.add(unit, weight(unit));
                clusters.push(cluster);
            }
        }
    }
    clusters
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(u32),
}

/// Density-based clusterer with outlier detection. Results are indices into
/// the input slice of the last [`Dbscan::run`] call; all working storage is
/// retained between invocations so a per-tick caller does not reallocate.
#[derive(Debug, Default)]
pub struct Dbscan {
    labels: Vec<Label>,
    neighbors: Vec<usize>,
    frontier: Vec<usize>,
    clusters: Vec<Vec<usize>>,
    live_clusters: usize,
    outliers: Vec<usize>,
}

impl Dbscan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster `units`: a unit seeds a cluster when at least `min_pts` other
    /// units lie within `eps`; clusters absorb all transitively reachable
    /// neighbors; everything else is an outlier. O(n^2) pairwise distances.
    pub fn run(&mut self, units: &[&Unit], eps: f32, min_pts: usize) {
        let n = units.len();
        let eps_sq = eps * eps;

        self.labels.clear();
        self.labels.resize(n, Label::Unvisited);
        self.outliers.clear();
        for cluster in &mut self.clusters {
            cluster.clear();
        }
        self.live_clusters = 0;

        for seed in 0..n {
            if self.labels[seed] != Label::Unvisited {
                continue;
            }
            self.collect_neighbors(units, seed, eps_sq);
            if self.neighbors.len() < min_pts {
                self.labels[seed] = Label::Noise;
                continue;
            }

            let cluster_id = self.live_clusters as u32;
            self.ensure_cluster();
            self.label_into(seed, cluster_id);

            self.frontier.clear();
            self.frontier.extend(self.neighbors.iter().copied());
            while let Some(point) = self.frontier.pop() {
                match self.labels[point] {
                    Label::Cluster(_) => continue,
                    Label::Noise => {
                        // Border point: reachable from a core point but not
                        // dense itself.
                        self.label_into(point, cluster_id);
                        continue;
                    }
                    Label::Unvisited => {}
                }
                self.label_into(point, cluster_id);
                self.collect_neighbors(units, point, eps_sq);
                if self.neighbors.len() >= min_pts {
                    self.frontier.extend(self.neighbors.iter().copied());
                }
            }
        }

        for (i, label) in self.labels.iter().enumerate() {
            if *label == Label::Noise {
                self.outliers.push(i);
            }
        }
    }

    fn collect_neighbors(&mut self, units: &[&Unit], point: usize, eps_sq: f32) {
        self.neighbors.clear();
        let origin = units[point].pos;
        for (j, other) in units.iter().enumerate() {
            if j != point && other.pos.distance_squared(origin) <= eps_sq {
                self.neighbors.push(j);
            }
        }
    }

    fn ensure_cluster(&mut self) {
        if self.live_clusters == self.clusters.len() {
            self.clusters.push(Vec::new());
        }
        self.live_clusters += 1;
    }

    fn label_into(&mut self, point: usize, cluster_id: u32) {
        self.labels[point] = Label::Cluster(cluster_id);
        self.clusters[cluster_id as usize].push(point);
    }

    /// Clusters of the last run, as indices into its input slice.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters[..self.live_clusters]
    }

    /// Outliers of the last run, as indices into its input slice.
    pub fn outliers(&self) -> &[usize] {
        &self.outliers
    }
}

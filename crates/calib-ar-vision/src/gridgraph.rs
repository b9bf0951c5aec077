//! 4-connected lattice graph over ChESS corners.
//!
//! Each corner links to at most one corner per grid direction. Directions are
//! taken in one global frame (`u` along `axis_u`, `v` a quarter turn from it)
//! and only links confirmed from both ends survive.

use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use crate::chess::ChessCorner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Step along a lattice axis in the global grid frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridDir {
    PlusU,
    MinusU,
    PlusV,
    MinusV,
}

impl GridDir {
    const ALL: [GridDir; 4] = [Self::PlusU, Self::MinusU, Self::PlusV, Self::MinusV];

    pub fn reverse(self) -> Self {
        match self {
            Self::PlusU => Self::MinusU,
            Self::MinusU => Self::PlusU,
            Self::PlusV => Self::MinusV,
            Self::MinusV => Self::PlusV,
        }
    }

    fn offset(self) -> (i32, i32) {
        match self {
            Self::PlusU => (1, 0),
            Self::MinusU => (-1, 0),
            Self::PlusV => (0, 1),
            Self::MinusV => (0, -1),
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Dominant axis of `d` in the frame whose `u` axis points along `axis_u`.
    fn of(d: &Vector2<f32>, axis_u: f32) -> Self {
        let (s, c) = axis_u.sin_cos();
        let along_u = c * d.x + s * d.y;
        let along_v = -s * d.x + c * d.y;
        match (along_u.abs() > along_v.abs(), along_u >= 0.0, along_v >= 0.0) {
            (true, true, _) => Self::PlusU,
            (true, false, _) => Self::MinusU,
            (false, _, true) => Self::PlusV,
            (false, _, false) => Self::MinusV,
        }
    }
}

/// Directed edge to a lattice neighbour.
#[derive(Clone, Copy, Debug)]
pub struct Link {
    pub to: usize,
    pub dir: GridDir,
    pub dist: f32,
    /// Sum of angular misfits; lower is better.
    pub cost: f32,
}

/// Candidate edge `a -> b` if the pair looks like adjacent board corners.
fn link_between(
    a: &ChessCorner,
    b: &ChessCorner,
    to: usize,
    params: &GridGraphParams,
    axis_u: f32,
) -> Option<Link> {
    let tol = params.orientation_tolerance_deg.to_radians();
    // bright diagonals of adjacent corners are a quarter turn apart
    if !is_orthogonal(a.orientation, b.orientation, tol) {
        return None;
    }

    let d = b.position - a.position;
    let dist = d.norm();
    if !(params.min_spacing_pix..=params.max_spacing_pix).contains(&dist) {
        return None;
    }

    // an edge runs at 45° to both diagonals
    let heading = d.y.atan2(d.x);
    let misfit_a = (axis_vec_diff(a.orientation, heading) - FRAC_PI_4).abs();
    let misfit_b = (axis_vec_diff(b.orientation, heading) - FRAC_PI_4).abs();
    if misfit_a.max(misfit_b) > tol {
        return None;
    }
    let misfit_pair = (FRAC_PI_2 - angle_diff_abs(a.orientation, b.orientation)).abs();

    Some(Link {
        to,
        dir: GridDir::of(&d, axis_u),
        dist,
        cost: misfit_a + misfit_b + misfit_pair,
    })
}

fn better(candidate: &Link, current: &Link) -> bool {
    candidate.dist < current.dist || (candidate.dist == current.dist && candidate.cost < current.cost)
}

/// Lattice graph with one slot per [`GridDir`] and node.
pub struct GridGraph {
    slots: Vec<[Option<Link>; 4]>,
}

impl GridGraph {
    /// Link every corner to its nearest valid neighbour per direction among
    /// its `k_neighbors` nearest corners, then drop one-sided links.
    pub fn new(corners: &[ChessCorner], params: &GridGraphParams, axis_u: f32) -> Self {
        if corners.is_empty() {
            return Self { slots: Vec::new() };
        }
        let points: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&points).into();

        let mut slots = Vec::with_capacity(corners.len());
        for (i, (a, query)) in corners.iter().zip(&points).enumerate() {
            let mut best: [Option<Link>; 4] = [None; 4];
            for hit in tree.nearest_n::<SquaredEuclidean>(query, params.k_neighbors + 1) {
                let j = hit.item as usize;
                if j == i {
                    continue;
                }
                let Some(link) = link_between(a, &corners[j], j, params, axis_u) else {
                    continue;
                };
                let slot = &mut best[link.dir.index()];
                if slot.as_ref().is_none_or(|cur| better(&link, cur)) {
                    *slot = Some(link);
                }
            }
            slots.push(best);
        }

        let mut graph = Self { slots };
        graph.drop_one_sided();
        graph
    }

    fn drop_one_sided(&mut self) {
        let confirmed = |slots: &[[Option<Link>; 4]], from: usize, link: &Link| {
            slots[link.to][link.dir.reverse().index()].is_some_and(|back| back.to == from)
        };
        let keep: Vec<[bool; 4]> = (0..self.slots.len())
            .map(|i| self.slots[i].map(|s| s.is_some_and(|l| confirmed(&self.slots, i, &l))))
            .collect();
        for (node, keep) in self.slots.iter_mut().zip(keep) {
            for (slot, k) in node.iter_mut().zip(keep) {
                if !k {
                    *slot = None;
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    fn links(&self, node: usize) -> impl Iterator<Item = &Link> + '_ {
        self.slots[node].iter().flatten()
    }

    pub fn link(&self, node: usize, dir: GridDir) -> Option<&Link> {
        self.slots[node][dir.index()].as_ref()
    }

    /// Connected components, each as `(node, u, v)` lattice coordinates
    /// relative to the component's lowest-index node. A node keeps the
    /// coordinate it is first reached with.
    pub fn lattice_components(&self) -> Vec<Vec<(usize, i32, i32)>> {
        let mut seen = vec![false; self.len()];
        let mut components = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..self.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            queue.push_back((start, 0, 0));
            let mut component = Vec::new();
            while let Some((node, u, v)) = queue.pop_front() {
                component.push((node, u, v));
                for dir in GridDir::ALL {
                    let Some(link) = self.link(node, dir) else {
                        continue;
                    };
                    if !seen[link.to] {
                        seen[link.to] = true;
                        let (du, dv) = dir.offset();
                        queue.push_back((link.to, u + du, v + dv));
                    }
                }
            }
            components.push(component);
        }
        components
    }
}

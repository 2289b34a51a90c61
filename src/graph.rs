//! `ConnectedComponentGraph`: a reusable union-find structure over V-region
//! column indices, used by Phase 1's r=2 pivot refinement (§4.6 step 1).
//!
//! Every row with `v_degree == 2` contributes an edge between its two
//! V-column positions; the solver asks for a node in the largest resulting
//! component and prefers a pivot row touching it, matching Gaussian
//! elimination's classic "maximize future sparsity" heuristic.

pub struct ConnectedComponentGraph {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl ConnectedComponentGraph {
    pub fn new(capacity: usize) -> Self {
        Self {
            parent: (0..capacity as u32).collect(),
            size: vec![1; capacity],
        }
    }

    /// Resets the structure for `n` nodes, reusing the backing storage.
    pub fn reset(&mut self, n: usize) {
        if self.parent.len() < n {
            self.parent.resize(n, 0);
            self.size.resize(n, 1);
        }
        for i in 0..n {
            self.parent[i] = i as u32;
            self.size[i] = 1;
        }
    }

    fn find(&mut self, x: u32) -> u32 {
        if self.parent[x as usize] != x {
            let root = self.find(self.parent[x as usize]);
            self.parent[x as usize] = root;
        }
        self.parent[x as usize]
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a as u32);
        let rb = self.find(b as u32);
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra as usize] >= self.size[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
    }

    pub fn component_size(&mut self, x: usize) -> u32 {
        let root = self.find(x as u32);
        self.size[root as usize]
    }

    /// Returns any node belonging to the largest component, or `None` if no
    /// edges have been added (every node is its own singleton component).
    pub fn largest_component_node(&mut self, n: usize) -> Option<u32> {
        let mut best_root = None;
        let mut best_size = 1u32;
        for i in 0..n {
            let root = self.find(i as u32);
            let size = self.size[root as usize];
            if size > best_size {
                best_size = size;
                best_root = Some(root);
            }
        }
        best_root.map(|root| {
            (0..n as u32)
                .find(|&x| self.find(x) == root)
                .unwrap_or(root)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unions_merge_components() {
        let mut g = ConnectedComponentGraph::new(6);
        g.reset(6);
        g.union(0, 1);
        g.union(1, 2);
        g.union(3, 4);
        assert_eq!(g.component_size(0), 3);
        assert_eq!(g.component_size(3), 2);
        assert_eq!(g.component_size(5), 1);
    }

    #[test]
    fn largest_component_prefers_bigger_group() {
        let mut g = ConnectedComponentGraph::new(5);
        g.reset(5);
        g.union(0, 1);
        g.union(2, 3);
        g.union(3, 4);
        let node = g.largest_component_node(5).unwrap();
        assert!(g.component_size(node as usize) == 3);
    }

    #[test]
    fn reset_clears_previous_unions() {
        let mut g = ConnectedComponentGraph::new(4);
        g.reset(4);
        g.union(0, 1);
        assert_eq!(g.component_size(0), 2);
        g.reset(4);
        assert_eq!(g.component_size(0), 1);
    }

    #[test]
    fn no_edges_means_no_largest_component() {
        let mut g = ConnectedComponentGraph::new(3);
        g.reset(3);
        assert!(g.largest_component_node(3).is_none());
    }
}

// src/clustering/proximity.rs - Single-linkage clustering of points under a distance threshold
use geo_types::Point;
use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::models::address::AddressRecord;
use crate::spatial::distance::distance_meters;

/// Groups `points` into clusters where two points share a cluster when they
/// are linked by a chain of pairs each strictly closer than `threshold_m`.
///
/// Returns clusters as positions into `points`, each sorted ascending, ordered
/// by their first member. Pairwise O(N²), meant for small groups.
pub fn cluster_by_distance(points: &[Point<f64>], threshold_m: f64) -> Vec<Vec<usize>> {
    let mut graph: UnGraph<usize, f64> = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..points.len()).map(|i| graph.add_node(i)).collect();

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let distance = distance_meters(points[i], points[j]);
            if distance < threshold_m {
                graph.add_edge(nodes[i], nodes[j], distance);
            }
        }
    }

    let mut visited = vec![false; graph.node_count()];
    let mut clusters = Vec::new();

    for node_idx in graph.node_indices() {
        if visited[node_idx.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node_idx];

        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(graph[current]);

            for neighbor in graph.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }

        component.sort_unstable();
        clusters.push(component);
    }

    debug!(
        "Clustered {} points into {} clusters ({} links under {:.1} m)",
        points.len(),
        clusters.len(),
        graph.edge_count(),
        threshold_m
    );
    clusters
}

/// Clusters located records; records without a location each form their own cluster.
pub fn cluster_records(records: &[AddressRecord], threshold_m: f64) -> Vec<Vec<usize>> {
    let (located, unlocated): (Vec<usize>, Vec<usize>) =
        (0..records.len()).partition(|&i| records[i].location.is_some());
    let points: Vec<Point<f64>> = located
        .iter()
        .filter_map(|&i| records[i].location)
        .collect();

    let mut clusters: Vec<Vec<usize>> = cluster_by_distance(&points, threshold_m)
        .into_iter()
        .map(|cluster| cluster.into_iter().map(|p| located[p]).collect())
        .collect();
    clusters.extend(unlocated.into_iter().map(|i| vec![i]));
    clusters.sort_by_key(|c| c[0]);
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::address::AddressTags;

    // ~1.11 m per 0.00001 degrees of latitude
    fn north(meters: f64) -> Point<f64> {
        Point::new(144.96, -37.8 + meters / 111_195.0)
    }

    #[test]
    fn test_empty_and_single() {
        assert!(cluster_by_distance(&[], 25.0).is_empty());
        assert_eq!(cluster_by_distance(&[north(0.0)], 25.0), vec![vec![0]]);
    }

    #[test]
    fn test_chained_links_join_clusters() {
        // 0 -20m- 1 -20m- 2 are transitively linked although 0 and 2 are 40 m apart
        let points = [north(0.0), north(20.0), north(40.0), north(500.0)];
        let clusters = cluster_by_distance(&points, 25.0);
        assert_eq!(clusters, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let points = [north(0.0), north(10.0)];
        let d = distance_meters(points[0], points[1]);
        assert_eq!(cluster_by_distance(&points, d), vec![vec![0], vec![1]]);
        assert_eq!(cluster_by_distance(&points, d + 0.01), vec![vec![0, 1]]);
    }

    #[test]
    fn test_same_cluster_iff_reachable_under_threshold() {
        let points: Vec<Point<f64>> = [0.0, 3.0, 70.0, 90.0, 200.0, 24.0, 112.0]
            .iter()
            .map(|&m| north(m))
            .collect();
        let threshold = 25.0;
        let clusters = cluster_by_distance(&points, threshold);
        let cluster_of = |i: usize| clusters.iter().position(|c| c.contains(&i)).unwrap();

        // direct links always share a cluster
        for i in 0..points.len() {
            for j in 0..points.len() {
                if distance_meters(points[i], points[j]) < threshold {
                    assert_eq!(cluster_of(i), cluster_of(j), "{} and {}", i, j);
                }
            }
        }
        // members of a cluster are not linked to anything outside it
        for (ci, cluster) in clusters.iter().enumerate() {
            for &i in cluster {
                for j in 0..points.len() {
                    if cluster_of(j) != ci {
                        assert!(distance_meters(points[i], points[j]) >= threshold);
                    }
                }
            }
        }
        assert_eq!(clusters, vec![vec![0, 1, 5], vec![2, 3, 6], vec![4]]);
    }

    #[test]
    fn test_cluster_records_keeps_unlocated_apart() {
        let records = vec![
            AddressRecord::new(AddressTags::default(), Some(north(0.0))),
            AddressRecord::new(AddressTags::default(), None),
            AddressRecord::new(AddressTags::default(), Some(north(5.0))),
        ];
        assert_eq!(cluster_records(&records, 25.0), vec![vec![0, 2], vec![1]]);
    }
}

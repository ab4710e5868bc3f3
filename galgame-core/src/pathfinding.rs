//! Shortest routes over the location graph.

use crate::locations::LocationGraph;
use std::collections::{HashMap, VecDeque};

impl LocationGraph {
    /// Breadth-first search from `start` to `end`.
    ///
    /// Returns the full route including both endpoints. Neighbors are expanded
    /// in the order they are listed, so the same map always yields the same
    /// route. `None` when either endpoint is missing or `end` is unreachable.
    /// Callers handle `start == end` themselves.
    pub fn find_path<'a>(&'a self, start: &str, end: &str) -> Option<Vec<&'a str>> {
        let start = self.get(start)?.id.as_str();
        let end = self.get(end)?.id.as_str();

        let mut parents: HashMap<&str, Option<&str>> = HashMap::new();
        let mut queue = VecDeque::new();

        parents.insert(start, None);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if current == end {
                let mut path = vec![end];
                let mut node = end;
                while let Some(&Some(prev)) = parents.get(node) {
                    path.push(prev);
                    node = prev;
                }
                path.reverse();
                return Some(path);
            }

            for neighbor in self.neighbors(current) {
                if !parents.contains_key(neighbor.as_str()) {
                    parents.insert(neighbor.as_str(), Some(current));
                    queue.push_back(neighbor.as_str());
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(toml: &str) -> LocationGraph {
        LocationGraph::from_toml_str(toml).unwrap()
    }

    const LINE: &str = r#"
        [[location]]
        id = "A"
        name = "Alpha"
        connections = ["B"]
        [[location]]
        id = "B"
        name = "Bravo"
        connections = ["A", "C"]
        [[location]]
        id = "C"
        name = "Charlie"
        connections = ["B"]
        [[location]]
        id = "D"
        name = "Delta"
    "#;

    #[test]
    fn test_linear_path() {
        let g = graph(LINE);
        assert_eq!(g.find_path("A", "C"), Some(vec!["A", "B", "C"]));
        assert_eq!(g.find_path("C", "A"), Some(vec!["C", "B", "A"]));
    }

    #[test]
    fn test_disconnected_target() {
        let g = graph(LINE);
        assert_eq!(g.find_path("A", "D"), None);
    }

    #[test]
    fn test_missing_endpoints() {
        let g = graph(LINE);
        assert_eq!(g.find_path("A", "Z"), None);
        assert_eq!(g.find_path("Z", "A"), None);
    }

    #[test]
    fn test_terminates_on_cycles() {
        let g = graph(
            r#"
            [[location]]
            id = "a"
            name = "a"
            connections = ["b"]
            [[location]]
            id = "b"
            name = "b"
            connections = ["c"]
            [[location]]
            id = "c"
            name = "c"
            connections = ["a"]
            [[location]]
            id = "island"
            name = "island"
            "#,
        );
        assert_eq!(g.find_path("a", "island"), None);
        assert_eq!(g.find_path("b", "a"), Some(vec!["b", "c", "a"]));
    }

    #[test]
    fn test_edges_are_directed() {
        let g = graph(
            r#"
            [[location]]
            id = "up"
            name = "up"
            connections = ["down"]
            [[location]]
            id = "down"
            name = "down"
            "#,
        );
        assert_eq!(g.find_path("up", "down"), Some(vec!["up", "down"]));
        assert_eq!(g.find_path("down", "up"), None);
    }

    #[test]
    fn test_ties_follow_listing_order() {
        let g = graph(
            r#"
            [[location]]
            id = "s"
            name = "s"
            connections = ["left", "right"]
            [[location]]
            id = "left"
            name = "left"
            connections = ["t"]
            [[location]]
            id = "right"
            name = "right"
            connections = ["t"]
            [[location]]
            id = "t"
            name = "t"
            "#,
        );
        assert_eq!(g.find_path("s", "t"), Some(vec!["s", "left", "t"]));
    }
}

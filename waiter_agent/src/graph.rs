//! Named waypoints the robot can travel between.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn distance(&self, other: &Pose) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unknown position: {0}")]
    UnknownPosition(String),
    #[error("position already exists: {0}")]
    DuplicatePosition(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionGraph {
    directed: bool,
    order: Vec<String>,
    poses: HashMap<String, Pose>,
    adjacency: HashMap<String, Vec<String>>,
    starting: Option<String>,
    entrance: Option<String>,
}

impl PositionGraph {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            order: Vec::new(),
            poses: HashMap::new(),
            adjacency: HashMap::new(),
            starting: None,
            entrance: None,
        }
    }

    pub fn undirected() -> Self {
        Self::new(false)
    }

    /// The first position added becomes the starting position until another
    /// one is chosen.
    pub fn add_position(&mut self, name: impl Into<String>, pose: Pose) -> Result<(), GraphError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(GraphError::DuplicatePosition(name));
        }
        if self.starting.is_none() {
            self.starting = Some(name.clone());
        }
        self.order.push(name.clone());
        self.poses.insert(name.clone(), pose);
        self.adjacency.insert(name, Vec::new());
        Ok(())
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.require(from)?;
        self.require(to)?;
        if let Some(next) = self.adjacency.get_mut(from) {
            next.push(to.to_owned());
        }
        if !self.directed {
            if let Some(next) = self.adjacency.get_mut(to) {
                next.push(from.to_owned());
            }
        }
        Ok(())
    }

    pub fn set_starting_position(&mut self, name: &str) -> Result<(), GraphError> {
        self.require(name)?;
        self.starting = Some(name.to_owned());
        Ok(())
    }

    pub fn set_entrance_position(&mut self, name: &str) -> Result<(), GraphError> {
        self.require(name)?;
        self.entrance = Some(name.to_owned());
        Ok(())
    }

    pub fn starting_position(&self) -> Option<&str> {
        self.starting.as_deref()
    }

    pub fn entrance_position(&self) -> Option<&str> {
        self.entrance.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.poses.contains_key(name)
    }

    pub fn pose(&self, name: &str) -> Option<Pose> {
        self.poses.get(name).copied()
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn neighbors(&self, name: &str) -> &[String] {
        self.adjacency.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Position closest to `pose` in the plane.
    pub fn nearest(&self, pose: &Pose) -> Option<&str> {
        self.order
            .iter()
            .filter_map(|name| Some((name, self.poses.get(name)?.distance(pose))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name.as_str())
    }

    /// Path with the fewest hops from `start` to `end`, both included.
    pub fn shortest_path(&self, start: &str, end: &str) -> Option<Vec<String>> {
        if !self.contains(start) || !self.contains(end) {
            return None;
        }
        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == end {
                let mut path = vec![end.to_owned()];
                let mut cursor = end;
                while let Some(&prev) = previous.get(cursor) {
                    path.push(prev.to_owned());
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.neighbors(node) {
                if visited.insert(next.as_str()) {
                    previous.insert(next.as_str(), node);
                    queue.push_back(next.as_str());
                }
            }
        }
        None
    }

    /// Vertex sort and `edge/2` facts for the logic program. Each edge is
    /// listed once regardless of direction.
    pub fn to_asp(&self) -> String {
        let mut out = String::from("% Position graph.\n\n");
        out.push_str(&format!("#vertex = {{{}}}.\n\n", self.order.join(",")));

        let mut seen = HashSet::new();
        for from in &self.order {
            for to in self.neighbors(from) {
                let key = if from <= to {
                    (from.as_str(), to.as_str())
                } else {
                    (to.as_str(), from.as_str())
                };
                if seen.insert(key) {
                    out.push_str(&format!("edge({from},{to}).\n"));
                }
            }
        }
        out
    }

    fn require(&self, name: &str) -> Result<(), GraphError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(GraphError::UnknownPosition(name.to_owned()))
        }
    }
}

//! The restaurant floor: waypoint graph, tables and chairs.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use waiter_agent::graph::GraphError;
use waiter_agent::{Pose, PositionGraph};

#[derive(Debug, Clone)]
pub struct Chair {
    pub name: String,
    pub table: String,
    pub pose: Pose,
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub graph: PositionGraph,
    pub tables: BTreeMap<String, Pose>,
    pub chairs: Vec<Chair>,
}

impl Scene {
    pub fn is_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn chair(&self, name: &str) -> Option<&Chair> {
        self.chairs.iter().find(|chair| chair.name == name)
    }

    /// Chairs of a table in seating order.
    pub fn chairs_at<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Chair> + 'a {
        self.chairs.iter().filter(move |chair| chair.table == table)
    }
}

const POSITIONS: [(&str, f64, f64); 18] = [
    ("n0", -1.9, -2.9),
    ("n1", -4.7, -1.75),
    ("n2", -4.7, 0.15),
    ("n3", -3.8, 0.875),
    ("n4", -1.9, 0.875),
    ("n5", -1.9, -1.75),
    ("n6", 0.0, -1.75),
    ("n7", 2.5, -1.75),
    ("n8", 0.0, 0.875),
    ("n9", 2.5, 0.875),
    ("n10", -1.9, 3.5),
    ("n11", 0.0, 3.5),
    ("n12", 0.75, 3.5),
    ("n13", 2.5, 3.5),
    ("n14", 0.75, 5.0),
    ("n15", -2.3, 3.6),
    ("n16", -3.8, 3.6),
    ("n17", -2.3, 5.1),
];

const EDGES: [(&str, &str); 17] = [
    ("n1", "n2"),
    ("n2", "n3"),
    ("n3", "n4"),
    ("n4", "n5"),
    ("n4", "n8"),
    ("n4", "n10"),
    ("n5", "n6"),
    ("n5", "n0"),
    ("n6", "n7"),
    ("n8", "n9"),
    ("n10", "n11"),
    ("n15", "n16"),
    ("n15", "n17"),
    ("n15", "n10"),
    ("n12", "n11"),
    ("n12", "n14"),
    ("n12", "n13"),
];

type TableLayout = (&'static str, f64, f64, &'static [(f64, f64, f64)]);

/// Table centre followed by its chairs as `(x, y, theta)`.
const TABLES: [TableLayout; 6] = [
    ("table1", 0.0, -2.6, &[(0.75, -2.6, 0.0), (-0.75, -2.6, PI)]),
    (
        "table2",
        0.0,
        -0.4,
        &[(0.75, -0.8, 0.0), (-0.75, -0.8, PI), (0.75, 0.0, 0.0), (-0.75, 0.0, PI)],
    ),
    (
        "table3",
        0.0,
        2.2,
        &[(0.75, 1.72, 0.0), (-0.75, 1.72, PI), (0.75, 2.6, 0.0), (-0.75, 2.6, PI)],
    ),
    ("table4", 2.5, -2.6, &[(3.25, -2.6, 0.0), (1.75, -2.6, 0.0)]),
    (
        "table5",
        2.5,
        -0.4,
        &[(3.25, -0.8, 0.0), (1.75, -0.8, 0.0), (3.25, 0.0, 0.0), (1.75, 0.0, 0.0)],
    ),
    (
        "table6",
        2.5,
        2.2,
        &[(3.25, 1.72, 0.0), (1.75, 1.72, 0.0), (3.25, 2.6, 0.0), (1.75, 2.6, 0.0)],
    ),
];

/// The restaurant used by the simulation: start `n1`, entrance `n0`.
pub fn restaurant() -> Result<Scene, GraphError> {
    let mut graph = PositionGraph::undirected();
    for (name, x, y) in POSITIONS {
        graph.add_position(name, Pose::new(x, y, 0.0))?;
    }
    for (from, to) in EDGES {
        graph.add_edge(from, to)?;
    }
    graph.set_starting_position("n1")?;
    graph.set_entrance_position("n0")?;

    let mut tables = BTreeMap::new();
    let mut chairs = Vec::new();
    for (index, (table, x, y, seats)) in TABLES.into_iter().enumerate() {
        tables.insert(table.to_owned(), Pose::new(x, y, 0.0));
        for (seat, &(cx, cy, theta)) in seats.iter().enumerate() {
            chairs.push(Chair {
                name: format!("chair{}t{}", seat + 1, index + 1),
                table: table.to_owned(),
                pose: Pose::new(cx, cy, theta),
            });
        }
    }

    Ok(Scene {
        graph,
        tables,
        chairs,
    })
}

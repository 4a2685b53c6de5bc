//! Kinematic stand-in for the robot and the bookkeeping of the dining room.

use crate::scene::Scene;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use waiter_agent::execution::{Actuator, Effects};
use waiter_agent::{ExecutionConfig, Observation, Pose};

/// Robot travel speed in metres per second.
pub const ROBOT_SPEED: f64 = 1.2;

/// Who is where. Clients are numbered from 1 and named `c<id>` in facts.
#[derive(Debug, Default)]
pub struct Restaurant {
    next_client: u32,
    waiting: Vec<u32>,
    seated: BTreeMap<String, u32>,
    groups: Vec<Vec<u32>>,
    carried: Vec<u32>,
    billed: BTreeSet<String>,
}

impl Restaurant {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_client(&mut self) -> u32 {
        self.next_client += 1;
        self.next_client
    }

    /// A group of `count` clients arrives at the entrance.
    pub fn clients_enter(&mut self, count: usize) -> Vec<u32> {
        let group: Vec<u32> = (0..count).map(|_| self.new_client()).collect();
        self.waiting.extend(&group);
        if !group.is_empty() {
            self.groups.push(group.clone());
        }
        group
    }

    /// Put a new client straight on a free chair.
    pub fn seat_new_client(&mut self, scene: &Scene, chair: &str) -> Option<u32> {
        if scene.chair(chair).is_none() || self.seated.contains_key(chair) {
            return None;
        }
        let id = self.new_client();
        self.seated.insert(chair.to_owned(), id);
        self.groups.push(vec![id]);
        Some(id)
    }

    pub fn clients_at_table(&self, scene: &Scene, table: &str) -> Vec<u32> {
        scene
            .chairs_at(table)
            .filter_map(|chair| self.seated.get(&chair.name).copied())
            .collect()
    }

    pub fn waiting(&self) -> &[u32] {
        &self.waiting
    }

    pub fn carried(&self) -> &[u32] {
        &self.carried
    }

    pub fn seated(&self) -> &BTreeMap<String, u32> {
        &self.seated
    }

    pub fn billed(&self) -> &BTreeSet<String> {
        &self.billed
    }

    /// The robot takes charge of the client and everyone in their group.
    pub fn pick(&mut self, client: u32) -> Vec<u32> {
        let group = self
            .groups
            .iter()
            .find(|group| group.contains(&client))
            .cloned()
            .unwrap_or_else(|| vec![client]);
        for id in &group {
            self.waiting.retain(|waiting| waiting != id);
            self.seated.retain(|_, seated| seated != id);
            if !self.carried.contains(id) {
                self.carried.push(*id);
            }
        }
        group
    }

    /// Seat every carried client at `table`, provided it is empty.
    pub fn seat_carried(&mut self, scene: &Scene, table: &str) -> Vec<(String, u32)> {
        if !scene.is_table(table) || !self.clients_at_table(scene, table).is_empty() {
            return Vec::new();
        }
        let seated: Vec<(String, u32)> = scene
            .chairs_at(table)
            .zip(self.carried.drain(..))
            .map(|(chair, id)| (chair.name.clone(), id))
            .collect();
        self.seated.extend(seated.iter().cloned());
        seated
    }

    pub fn deliver_bill(&mut self, target: &str) {
        self.billed.insert(target.to_owned());
    }

    /// Facts true before the first episode.
    pub fn initial_situation(&self, scene: &Scene) -> Vec<String> {
        let mut facts = Vec::new();
        if let Some(start) = scene.graph.starting_position() {
            facts.push(format!("currentlocation(agent,{start})"));
        }
        for (chair, id) in &self.seated {
            if let Some(chair) = scene.chair(chair) {
                facts.push(format!("isattable(c{id},{})", chair.table));
            }
        }
        facts
    }
}

pub type SharedRestaurant = Arc<Mutex<Restaurant>>;

pub fn lock(world: &Mutex<Restaurant>) -> MutexGuard<'_, Restaurant> {
    world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn client_id(name: &str) -> Option<u32> {
    name.trim().strip_prefix('c')?.parse().ok()
}

/// Follows the waypoint graph at constant speed.
pub struct SimulatedRobot {
    scene: Arc<Scene>,
    world: SharedRestaurant,
    config: ExecutionConfig,
    pose: Pose,
    goal: Option<String>,
    path: VecDeque<String>,
    speed: f64,
}

impl SimulatedRobot {
    pub fn new(scene: Arc<Scene>, world: SharedRestaurant, config: ExecutionConfig) -> Self {
        let start = scene.graph.starting_position().map(str::to_owned);
        let pose = start
            .as_deref()
            .and_then(|name| scene.graph.pose(name))
            .unwrap_or_default();
        Self {
            scene,
            world,
            config,
            pose,
            goal: start,
            path: VecDeque::new(),
            speed: ROBOT_SPEED,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn is_moving(&self) -> bool {
        !self.path.is_empty()
    }

    fn route_origin(&self) -> Option<String> {
        let nearest = self.scene.graph.nearest(&self.pose).map(str::to_owned);
        match &self.goal {
            Some(goal) if self.path.is_empty() => Some(goal.clone()),
            _ => nearest,
        }
    }
}

impl Actuator for SimulatedRobot {
    fn is_near(&self, target: &str) -> bool {
        match self.scene.graph.pose(target) {
            Some(pose) => self.pose.distance(&pose) < self.config.arrival_tolerance,
            None => {
                tracing::warn!(target, "unknown position, treating it as reached");
                true
            }
        }
    }

    fn move_to(&mut self, target: &str) {
        let Some(origin) = self.route_origin() else {
            return;
        };
        match self.scene.graph.shortest_path(&origin, target) {
            Some(path) => {
                tracing::debug!(path = ?path, "moving");
                self.path = path.into_iter().collect();
            }
            None => {
                tracing::warn!(from = %origin, target, "no route to position");
                self.path.clear();
            }
        }
        self.goal = Some(target.to_owned());
    }

    fn current_goal_location(&self) -> Option<String> {
        self.goal.clone()
    }

    fn tick(&mut self, dt: Duration) {
        let mut budget = self.speed * dt.as_secs_f64();
        while let Some(next) = self.path.front() {
            let Some(waypoint) = self.scene.graph.pose(next) else {
                self.path.pop_front();
                continue;
            };
            let distance = self.pose.distance(&waypoint);
            let last = self.path.len() == 1;
            if distance <= budget {
                budget -= distance;
                self.pose = waypoint;
                self.path.pop_front();
                continue;
            }
            if !last && distance < self.config.waypoint_tolerance {
                self.path.pop_front();
                continue;
            }
            let ratio = budget / distance;
            self.pose.x += (waypoint.x - self.pose.x) * ratio;
            self.pose.y += (waypoint.y - self.pose.y) * ratio;
            self.pose.theta = (waypoint.y - self.pose.y).atan2(waypoint.x - self.pose.x);
            break;
        }
    }
}

impl Effects for SimulatedRobot {
    fn seat(&mut self, client: &str, table: &str) -> Vec<Observation> {
        let seated = lock(&self.world).seat_carried(&self.scene, table);
        if seated.is_empty() {
            tracing::warn!(client, table, "nobody could be seated");
        }
        for (chair, id) in seated {
            tracing::info!(client = id, chair = %chair, "client seated");
        }
        Vec::new()
    }

    fn pick(&mut self, client: &str) -> Vec<Observation> {
        match client_id(client) {
            Some(id) => {
                let group = lock(&self.world).pick(id);
                tracing::info!(client, group = ?group, "clients picked up");
            }
            None => tracing::warn!(client, "not a client name"),
        }
        Vec::new()
    }

    fn give_bill(&mut self, target: &str) -> Vec<Observation> {
        lock(&self.world).deliver_bill(target);
        tracing::info!(target, "bill delivered");
        Vec::new()
    }
}

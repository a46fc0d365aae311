//! Road network graph for travel-time-weighted routing

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::control::types::{ClassSet, SegmentId};

/// A unique identifier for a junction (graph node)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JunctionId(pub String);

impl JunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of a directed road segment
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub id: SegmentId,
    pub from: JunctionId,
    pub to: JunctionId,
    /// Length in meters
    pub length: f64,
    /// Speed limit in meters per second
    pub speed_limit: f64,
    /// Allowed-class set per lane, ordered by lane index
    pub lanes: Vec<ClassSet>,
}

impl SegmentSpec {
    /// Traversal time at the speed limit with no traffic
    pub fn free_flow_time(&self) -> f64 {
        self.length / self.speed_limit
    }
}

/// Directed junction/segment graph with per-segment adapted
/// travel-time weights consumed by routing
#[derive(Default)]
pub struct RoadNetwork {
    graph: DiGraph<JunctionId, SegmentId>,

    /// Maps junction IDs to their node indices in the graph
    junction_to_node: HashMap<JunctionId, NodeIndex>,

    /// Junction layout for the terminal map
    junction_positions: BTreeMap<JunctionId, (f32, f32)>,

    /// Static segment descriptions
    segments: BTreeMap<SegmentId, SegmentSpec>,

    /// Segment ids in insertion order; this is the engine-visible order
    segment_order: Vec<SegmentId>,

    /// Adapted travel-time weight per segment, seconds
    adapted_travel_time: BTreeMap<SegmentId, OrderedFloat<f64>>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a junction to the network graph
    pub fn add_junction(&mut self, junction: JunctionId, position: (f32, f32)) {
        if self.junction_to_node.contains_key(&junction) {
            return;
        }
        let node = self.graph.add_node(junction.clone());
        self.junction_to_node.insert(junction.clone(), node);
        self.junction_positions.insert(junction, position);
    }

    pub fn junction_position(&self, junction: &JunctionId) -> Option<(f32, f32)> {
        self.junction_positions.get(junction).copied()
    }

    pub fn junction_positions(&self) -> &BTreeMap<JunctionId, (f32, f32)> {
        &self.junction_positions
    }

    /// Adds a segment and its graph edge; the adapted weight starts at
    /// the free-flow traversal time
    pub fn add_segment(&mut self, spec: SegmentSpec) -> Result<()> {
        if spec.lanes.is_empty() {
            anyhow::bail!("Segment {} must have at least one lane", spec.id);
        }
        let from = *self
            .junction_to_node
            .get(&spec.from)
            .with_context(|| format!("Junction {} not found", spec.from))?;
        let to = *self
            .junction_to_node
            .get(&spec.to)
            .with_context(|| format!("Junction {} not found", spec.to))?;

        self.graph.add_edge(from, to, spec.id.clone());
        self.adapted_travel_time
            .insert(spec.id.clone(), OrderedFloat(spec.free_flow_time()));
        self.segment_order.push(spec.id.clone());
        self.segments.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn segment(&self, segment: &SegmentId) -> Option<&SegmentSpec> {
        self.segments.get(segment)
    }

    pub fn segment_mut(&mut self, segment: &SegmentId) -> Option<&mut SegmentSpec> {
        self.segments.get_mut(segment)
    }

    /// All segment ids, in insertion order
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segment_order.clone()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn junction_count(&self) -> usize {
        self.junction_to_node.len()
    }

    pub fn adapted_travel_time(&self, segment: &SegmentId) -> Result<f64> {
        self.adapted_travel_time
            .get(segment)
            .map(|weight| weight.into_inner())
            .with_context(|| format!("Segment {} not found", segment))
    }

    pub fn set_adapted_travel_time(&mut self, segment: &SegmentId, weight: f64) -> Result<()> {
        let entry = self
            .adapted_travel_time
            .get_mut(segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        *entry = OrderedFloat(weight);
        Ok(())
    }

    /// Finds the cheapest route between two junctions against current
    /// adapted travel times, using A* with a null heuristic (Dijkstra).
    /// Returns the segment sequence, empty when start equals end.
    pub fn find_route(&self, from: &JunctionId, to: &JunctionId) -> Option<Vec<SegmentId>> {
        if from == to {
            return Some(vec![]);
        }

        let start = *self.junction_to_node.get(from)?;
        let end = *self.junction_to_node.get(to)?;

        let (_, node_path) = astar(
            &self.graph,
            start,
            |node| node == end,
            |edge| {
                self.adapted_travel_time
                    .get(edge.weight())
                    .copied()
                    .unwrap_or(OrderedFloat(f64::INFINITY))
            },
            |_| OrderedFloat(0.0),
        )?;

        // Convert the node path to segments, taking the cheapest edge
        // where junctions are connected in parallel
        let mut route = Vec::with_capacity(node_path.len().saturating_sub(1));
        for pair in node_path.windows(2) {
            let segment = self
                .graph
                .edges(pair[0])
                .filter(|edge| edge.target() == pair[1])
                .min_by_key(|edge| {
                    self.adapted_travel_time
                        .get(edge.weight())
                        .copied()
                        .unwrap_or(OrderedFloat(f64::INFINITY))
                })
                .map(|edge| edge.weight().clone())?;
            route.push(segment);
        }
        Some(route)
    }
}

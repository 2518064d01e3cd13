//! Instruction synthesis.
//!
//! Walks the simplified path one segment at a time and narrates it. The walk
//! carries two pieces of state: the floor the traveller is on (seeded from
//! the start endpoint, 0 when undeclared) and the distance covered so far.
//!
//! Per segment `start -> end`:
//!
//! 1. add the segment length to the running total
//! 2. narrate the segment: "Walk straight" for the first one, otherwise the
//!    turn taken at `start`, banded by angle and sided by turn direction
//! 3. if a vertical transport sits at the segment's end (or start, depending
//!    on [`TransportMatchPolicy`]) narrate it and move to its destination floor
//! 4. otherwise, if the floor map puts `end` on another floor, narrate the
//!    floor change
//!
//! The walk ends with an arrival sentence and the total distance.
//!
//! Instructions are structured records; their [`Display`](fmt::Display) impl is
//! the only place text is produced.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::ClassifiedRoute;
use crate::features::TransportKind;
use crate::geo_utils::{haversine_distance, signed_turn_angle_degrees};
use crate::{Coordinate, GuidanceConfig};

/// Which way a turn goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// A heading change, banded by how sharp it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "band", content = "side", rename_all = "snake_case")]
pub enum Turn {
    Straight,
    Slight(Side),
    Regular(Side),
    Sharp(Side),
}

impl Turn {
    /// Band a signed turn angle (positive = right, see
    /// [`signed_turn_angle_degrees`]) using the thresholds in `config`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use transfer_guide::GuidanceConfig;
    /// use transfer_guide::instructions::{Side, Turn};
    ///
    /// let config = GuidanceConfig::default();
    /// assert_eq!(Turn::from_angle(19.9, &config), Turn::Straight);
    /// assert_eq!(Turn::from_angle(20.1, &config), Turn::Slight(Side::Right));
    /// assert_eq!(Turn::from_angle(-90.0, &config), Turn::Regular(Side::Left));
    /// assert_eq!(Turn::from_angle(120.1, &config), Turn::Sharp(Side::Right));
    /// ```
    pub fn from_angle(signed_angle: f64, config: &GuidanceConfig) -> Self {
        let magnitude = signed_angle.abs();
        let side = if signed_angle < 0.0 { Side::Left } else { Side::Right };

        if magnitude < config.straight_threshold_degrees {
            Turn::Straight
        } else if magnitude < config.slight_turn_threshold_degrees {
            Turn::Slight(side)
        } else if magnitude < config.sharp_turn_threshold_degrees {
            Turn::Regular(side)
        } else {
            Turn::Sharp(side)
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Turn::Straight => f.write_str("Continue straight"),
            Turn::Slight(side) => write!(f, "Turn slightly {}", side),
            Turn::Regular(side) => write!(f, "Turn {}", side),
            Turn::Sharp(side) => write!(f, "Turn sharp {}", side),
        }
    }
}

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Where the walk begins
    Start { label: Option<String>, floor: i32 },
    /// The first segment
    Walk { distance_meters: f64 },
    /// Every later segment, with the turn taken at its start
    Turn { turn: Turn, angle_degrees: f64, distance_meters: f64 },
    ApproachTransport { transport: TransportKind },
    TakeTransport {
        transport: TransportKind,
        direction: Option<String>,
        from_floor: i32,
        to_floor: i32,
    },
    /// Floor change without an explicit transport
    FloorChange { from_floor: i32, to_floor: i32 },
    Arrive { label: Option<String>, floor: i32 },
    Summary { total_distance_meters: f64 },
}

/// Whole meters, halves rounded away from zero.
fn whole_meters(distance: f64) -> i64 {
    distance.round() as i64
}

fn article(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Stairs => "the",
        TransportKind::Escalator => "an",
        TransportKind::Lift | TransportKind::Ramp => "a",
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Start { label, floor } => write!(
                f,
                "You are at {} on floor {}.",
                label.as_deref().unwrap_or("the starting point"),
                floor
            ),
            Instruction::Walk { distance_meters } => {
                write!(f, "Walk straight for about {} meters.", whole_meters(*distance_meters))
            }
            Instruction::Turn { turn, distance_meters, .. } => write!(
                f,
                "{} and continue for about {} meters.",
                turn,
                whole_meters(*distance_meters)
            ),
            Instruction::ApproachTransport { transport } => {
                write!(f, "You are in front of {} {}.", article(*transport), transport)
            }
            Instruction::TakeTransport { transport, direction, from_floor, to_floor } => match direction {
                Some(direction) => write!(
                    f,
                    "Take the {} {} from floor {} to floor {}.",
                    transport, direction, from_floor, to_floor
                ),
                None => write!(f, "Take the {} from floor {} to floor {}.", transport, from_floor, to_floor),
            },
            Instruction::FloorChange { from_floor, to_floor } => {
                if to_floor > from_floor {
                    write!(f, "Go up to floor {}.", to_floor)
                } else if to_floor < from_floor {
                    write!(f, "Go down to floor {}.", to_floor)
                } else {
                    write!(f, "You are now on floor {}.", to_floor)
                }
            }
            Instruction::Arrive { label, floor } => write!(
                f,
                "You have arrived at {} on floor {}.",
                label.as_deref().unwrap_or("your destination"),
                floor
            ),
            Instruction::Summary { total_distance_meters } => write!(
                f,
                "Total distance: approximately {} meters.",
                whole_meters(*total_distance_meters)
            ),
        }
    }
}

/// Render instructions as text, one line each, in order.
pub fn render(instructions: &[Instruction]) -> Vec<String> {
    instructions.iter().map(ToString::to_string).collect()
}

/// Which path vertices are checked for vertical transport, and whether the
/// transport must leave from the current floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TransportMatchPolicy {
    /// Also look for transport at each segment's start vertex, not only its end
    pub check_segment_start: bool,
    /// Skip a transport whose declared source floor differs from the current
    /// floor. Transports without a declared source floor always match.
    pub require_source_floor: bool,
}

/// The result of planning a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directions {
    pub instructions: Vec<Instruction>,
    /// The simplified path the instructions narrate
    pub path: Vec<Coordinate>,
    /// Sum of segment lengths along `path`, in meters
    pub total_distance: f64,
    /// Floor reported on arrival
    pub final_floor: i32,
}

impl Directions {
    /// The instructions rendered as text.
    pub fn lines(&self) -> Vec<String> {
        render(&self.instructions)
    }
}

struct Synthesizer<'a> {
    route: &'a ClassifiedRoute,
    config: &'a GuidanceConfig,
    current_floor: i32,
    total_distance: f64,
    fired: Vec<Coordinate>,
    instructions: Vec<Instruction>,
}

impl<'a> Synthesizer<'a> {
    fn new(route: &'a ClassifiedRoute, config: &'a GuidanceConfig) -> Self {
        Self {
            route,
            config,
            current_floor: route.start.floor.unwrap_or(0),
            total_distance: 0.0,
            fired: Vec::new(),
            instructions: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.instructions.push(Instruction::Start {
            label: self.route.start.label.clone(),
            floor: self.current_floor,
        });
    }

    fn step(&mut self, prev: Option<&Coordinate>, start: &Coordinate, end: &Coordinate) {
        let distance_meters = haversine_distance(start, end);
        self.total_distance += distance_meters;

        let narration = match prev {
            None => Instruction::Walk { distance_meters },
            Some(prev) => {
                let angle_degrees = signed_turn_angle_degrees(prev, start, end);
                Instruction::Turn {
                    turn: Turn::from_angle(angle_degrees, self.config),
                    angle_degrees,
                    distance_meters,
                }
            }
        };
        self.instructions.push(narration);

        if !self.take_transport(start, end) {
            self.follow_floor(end);
        }
    }

    /// Narrate a vertical transport at this segment, if any. The nearest
    /// usable transport within range wins; each one fires at most once per
    /// walk.
    fn take_transport(&mut self, start: &Coordinate, end: &Coordinate) -> bool {
        let route = self.route;
        let policy = self.config.transport_policy;
        let vertices = [policy.check_segment_start.then_some(start), Some(end)];

        for vertex in vertices.into_iter().flatten() {
            let candidates = route.transports.all_within(vertex, self.config.transport_match_radius_meters);
            let Some((position, transport)) = candidates.into_iter().find(|(position, transport)| {
                if self.fired.contains(position) {
                    return false;
                }
                if policy.require_source_floor
                    && transport.source_floor.is_some_and(|floor| floor != self.current_floor)
                {
                    debug!(
                        "Skipping {} from floor {:?}: currently on floor {}",
                        transport.kind, transport.source_floor, self.current_floor
                    );
                    return false;
                }
                true
            }) else {
                continue;
            };

            self.instructions.push(Instruction::ApproachTransport { transport: transport.kind });
            self.instructions.push(Instruction::TakeTransport {
                transport: transport.kind,
                direction: transport.direction.clone(),
                from_floor: transport.source_floor.unwrap_or(self.current_floor),
                to_floor: transport.destination_floor,
            });
            self.current_floor = transport.destination_floor;
            self.fired.push(position);
            return true;
        }

        false
    }

    fn follow_floor(&mut self, end: &Coordinate) {
        let route = self.route;
        if let Some(&floor) = route.floors.get_within(end, self.config.floor_match_radius_meters) {
            if floor != self.current_floor {
                self.instructions.push(Instruction::FloorChange {
                    from_floor: self.current_floor,
                    to_floor: floor,
                });
                self.current_floor = floor;
            }
        }
    }

    fn finish(mut self, path: &[Coordinate]) -> Directions {
        let final_floor = self.route.end.floor.unwrap_or(self.current_floor);

        self.instructions.push(Instruction::Arrive {
            label: self.route.end.label.clone(),
            floor: final_floor,
        });
        self.instructions.push(Instruction::Summary {
            total_distance_meters: self.total_distance,
        });

        Directions {
            instructions: self.instructions,
            path: path.to_vec(),
            total_distance: self.total_distance,
            final_floor,
        }
    }
}

/// Narrate an already-simplified `path` using the side maps and endpoints of
/// `route`.
///
/// Never fails: an empty or single-point path yields only the start, arrival
/// and zero-distance summary.
pub fn synthesize(path: &[Coordinate], route: &ClassifiedRoute, config: &GuidanceConfig) -> Directions {
    let mut synthesizer = Synthesizer::new(route, config);
    synthesizer.begin();

    for (i, segment) in path.windows(2).enumerate() {
        let prev = i.checked_sub(1).map(|p| &path[p]);
        synthesizer.step(prev, &segment[0], &segment[1]);
    }

    let directions = synthesizer.finish(path);
    info!(
        "Synthesized {} instructions over {} segments ({:.0}m)",
        directions.instructions.len(),
        path.len().saturating_sub(1),
        directions.total_distance
    );
    directions
}

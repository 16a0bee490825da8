//! Repair route planning.
//!
//! [`nearest_neighbor_tour`] is the bare greedy heuristic over points;
//! [`plan_route`] selects candidate detections from the ledger and wraps the
//! tour with the figures a dispatcher needs.

mod nearest;
mod route;

pub use nearest::{Tour, nearest_neighbor_tour};
pub use route::{Candidates, RouteOptions, RoutePlan, plan_route, select_candidates};

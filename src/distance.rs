/*!
 * Pairwise distances between structures, under one of two interchangeable policies.
 *
 * Great-circle is a pure calculation and always available. Road-network asks an OSRM-style
 * routing service for the actual driving distance; those lookups are slow and rate-limited, so
 * the oracle memoizes every unordered pair for the lifetime of the run. A failed lookup degrades
 * to [RoadDistance::Unreachable] instead of aborting the run - route servers flake, and one
 * missing route must not kill an hour of processing.
 *
 * The oracle is owned by a single analysis run: it is built at run start and dropped at run end,
 * so no cached distance or call counter ever leaks between runs.
 */

use crate::{geo::great_circle_distance, OaeLotsResult};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::time::{Duration, Instant};
use strum::{Display, EnumString};

/// How long to wait on one routing round trip.
const ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

/** Which distance metric a run uses for cluster statistics. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DistancePolicy {
    /// Straight-line haversine distance. Fast, always available.
    GreatCircle,
    /// Driving distance from an external routing service.
    RoadNetwork,
}

/**
 * A distance in kilometers, or an explicit marker that no route exists.
 *
 * Callers must handle the unreachable case rather than letting an infinity leak into arithmetic:
 * unreachable dominates a max reduction and must be excluded from an average.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadDistance {
    Km(f64),
    Unreachable,
}

impl RoadDistance {
    /// The numeric distance, when there is one.
    pub fn km(self) -> Option<f64> {
        match self {
            RoadDistance::Km(km) => Some(km),
            RoadDistance::Unreachable => None,
        }
    }

    /// Max reduction: an unreachable pair dominates any finite distance.
    pub fn max(self, other: RoadDistance) -> RoadDistance {
        match (self, other) {
            (RoadDistance::Km(a), RoadDistance::Km(b)) => RoadDistance::Km(a.max(b)),
            _ => RoadDistance::Unreachable,
        }
    }
}

impl std::fmt::Display for RoadDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            RoadDistance::Km(km) => write!(f, "{:.2} km", km),
            RoadDistance::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Driving distance in meters.
    distance: f64,
}

/** The distance calculator injected into cluster metrics. One per analysis run. */
pub struct DistanceOracle {
    policy: DistancePolicy,
    route_server: String,
    client: Option<reqwest::blocking::Client>,
    /// Memo of already resolved road distances, keyed on the coordinate pair.
    memo: FxHashMap<String, RoadDistance>,
    api_calls: u64,
}

impl DistanceOracle {
    pub fn new(policy: DistancePolicy, route_server: &str) -> OaeLotsResult<Self> {
        let client = match policy {
            DistancePolicy::GreatCircle => None,
            DistancePolicy::RoadNetwork => Some(
                reqwest::blocking::Client::builder()
                    .timeout(ROUTE_TIMEOUT)
                    .build()?,
            ),
        };

        Ok(DistanceOracle {
            policy,
            route_server: route_server.trim_end_matches('/').to_owned(),
            client,
            memo: FxHashMap::default(),
            api_calls: 0,
        })
    }

    /// Shorthand for a great-circle oracle, which can't fail to construct.
    pub fn great_circle() -> Self {
        DistanceOracle {
            policy: DistancePolicy::GreatCircle,
            route_server: String::new(),
            client: None,
            memo: FxHashMap::default(),
            api_calls: 0,
        }
    }

    pub fn policy(&self) -> DistancePolicy {
        self.policy
    }

    /// How many routing requests actually went over the wire so far.
    pub fn api_call_count(&self) -> u64 {
        self.api_calls
    }

    /**
     * The distance between two points in kilometers under this oracle's policy.
     *
     * Road-network lookups are memoized under both key orders, so each unordered pair costs at
     * most one HTTP round trip per run.
     */
    pub fn distance(&mut self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> RoadDistance {
        match self.policy {
            DistancePolicy::GreatCircle => {
                RoadDistance::Km(great_circle_distance(lat1, lon1, lat2, lon2))
            }
            DistancePolicy::RoadNetwork => self.road_distance(lat1, lon1, lat2, lon2),
        }
    }

    fn road_distance(&mut self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> RoadDistance {
        if lat1 == lat2 && lon1 == lon2 {
            return RoadDistance::Km(0.0);
        }

        let key = pair_key(lat1, lon1, lat2, lon2);
        if let Some(&hit) = self.memo.get(&key) {
            return hit;
        }

        let rev_key = pair_key(lat2, lon2, lat1, lon1);
        if let Some(&hit) = self.memo.get(&rev_key) {
            return hit;
        }

        let dist = self.fetch_route(lat1, lon1, lat2, lon2);
        self.memo.insert(key, dist);

        dist
    }

    fn fetch_route(&mut self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> RoadDistance {
        // Only a road-network oracle carries a client; a great-circle oracle never gets here.
        let client = match &self.client {
            Some(client) => client,
            None => return RoadDistance::Unreachable,
        };

        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.route_server, lon1, lat1, lon2, lat2
        );

        let started = Instant::now();
        self.api_calls += 1;

        let response: Result<RouteResponse, Box<dyn std::error::Error>> = client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(Into::into)
            .and_then(|resp| resp.json::<RouteResponse>().map_err(Into::into));

        match response {
            Ok(body) => match body.routes.first() {
                Some(route) => {
                    let km = route.distance / 1000.0;
                    log::debug!(
                        "route call #{}: {:.2} km in {} ms",
                        self.api_calls,
                        km,
                        started.elapsed().as_millis()
                    );
                    RoadDistance::Km(km)
                }
                None => {
                    log::warn!(
                        "no route between ({:.6},{:.6}) and ({:.6},{:.6})",
                        lat1,
                        lon1,
                        lat2,
                        lon2
                    );
                    RoadDistance::Unreachable
                }
            },
            Err(err) => {
                log::warn!(
                    "route lookup failed for ({:.6},{:.6})-({:.6},{:.6}): {}",
                    lat1,
                    lon1,
                    lat2,
                    lon2,
                    err
                );
                RoadDistance::Unreachable
            }
        }
    }
}

fn pair_key(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> String {
    format!("{:.6},{:.6}|{:.6},{:.6}", lat1, lon1, lat2, lon2)
}

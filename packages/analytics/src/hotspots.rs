//! Distance-threshold hotspot clustering.
//!
//! Greedy seed clustering: incidents are visited in `(timestamp, id)`
//! order, joining the first existing cluster whose seed lies within
//! the threshold, else seeding a new cluster. The fixed visit order
//! makes the whole pipeline deterministic — identical inputs always
//! produce identical hotspot sequences.

use std::collections::BTreeMap;

use crime_brief_analytics_models::Hotspot;
use crime_brief_models::{Incident, IncidentCategory, LatLon};
use crime_brief_spatial::haversine_miles;

use crate::AnalyzerOptions;

struct Cluster<'a> {
    seed: LatLon,
    members: Vec<&'a Incident>,
}

/// Clusters current-period incidents into ranked hotspots.
///
/// Ranking: incident count descending, then earliest cluster timestamp,
/// then dominant category order. Clusters below
/// [`AnalyzerOptions::min_cluster_size`] are dropped; at most
/// [`AnalyzerOptions::max_hotspots`] are returned.
#[must_use]
pub fn cluster_hotspots(incidents: &[Incident], options: &AnalyzerOptions) -> Vec<Hotspot> {
    let mut ordered: Vec<&Incident> = incidents.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut clusters: Vec<Cluster<'_>> = Vec::new();
    for incident in ordered {
        let joined = clusters.iter_mut().find(|cluster| {
            haversine_miles(cluster.seed, incident.location) <= options.cluster_threshold_miles
        });
        match joined {
            Some(cluster) => cluster.members.push(incident),
            None => clusters.push(Cluster {
                seed: incident.location,
                members: vec![incident],
            }),
        }
    }

    let mut hotspots: Vec<Hotspot> = clusters
        .iter()
        .filter(|cluster| cluster.members.len() >= options.min_cluster_size)
        .map(build_hotspot)
        .collect();

    hotspots.sort_by(|a, b| {
        b.incident_count
            .cmp(&a.incident_count)
            .then(a.earliest.cmp(&b.earliest))
            .then(a.dominant_category.cmp(&b.dominant_category))
    });
    hotspots.truncate(options.max_hotspots);
    hotspots
}

#[allow(clippy::cast_precision_loss)]
fn build_hotspot(cluster: &Cluster<'_>) -> Hotspot {
    let n = cluster.members.len() as f64;
    let center = LatLon::new(
        cluster.members.iter().map(|i| i.location.latitude).sum::<f64>() / n,
        cluster.members.iter().map(|i| i.location.longitude).sum::<f64>() / n,
    );

    let radius_miles = cluster
        .members
        .iter()
        .map(|i| haversine_miles(center, i.location))
        .fold(0.0_f64, f64::max);

    let mut category_counts: BTreeMap<IncidentCategory, u64> = BTreeMap::new();
    for member in &cluster.members {
        *category_counts.entry(member.category).or_insert(0) += 1;
    }
    // Ties resolve to the earlier taxonomy variant (BTreeMap order,
    // strict greater-than below).
    let mut dominant = IncidentCategory::Other;
    let mut best = 0;
    for (&category, &count) in &category_counts {
        if count > best {
            best = count;
            dominant = category;
        }
    }

    let earliest = cluster
        .members
        .iter()
        .map(|i| i.timestamp)
        .min()
        .unwrap_or_default();

    Hotspot {
        center,
        radius_miles,
        incident_count: cluster.members.len() as u64,
        dominant_category: dominant,
        earliest,
    }
}

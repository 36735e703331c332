/// Station discovery: provider catalog listing scoped to the boundary.
///
/// Providers return rectangular (or global) catalogs; the polygon test is
/// what actually scopes the run. Stations without usable coordinates are
/// excluded and counted rather than silently dropped, and the retained
/// set is sorted by id so identical inputs yield identical task order.

use crate::geometry::BoundaryPolygon;
use crate::ingest::ProviderClient;
use crate::model::{AcquireError, Station};
use std::sync::Arc;

/// Outcome of discovery against one provider.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Stations inside (or on) the boundary, sorted by id.
    pub stations: Vec<Arc<Station>>,
    /// Catalog rows excluded because they carried no usable coordinates.
    pub missing_coordinates: usize,
}

/// Lists the provider's catalog and filters it to the boundary polygon.
pub fn discover(
    client: &dyn ProviderClient,
    boundary: &BoundaryPolygon,
    parameter_codes: &[String],
) -> Result<DiscoveryReport, AcquireError> {
    let catalog = client.list_stations(parameter_codes)?;
    let catalog_size = catalog.len();

    let mut report = DiscoveryReport::default();
    for station in catalog {
        if !station.has_coordinates() {
            report.missing_coordinates += 1;
            continue;
        }
        // has_coordinates guarantees both are Some and finite.
        let (lat, lon) = (station.latitude.unwrap(), station.longitude.unwrap());
        if boundary.contains(lat, lon) {
            report.stations.push(Arc::new(station));
        }
    }
    report.stations.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::info!(
        provider = %client.provider(),
        catalog = catalog_size,
        retained = report.stations.len(),
        missing_coordinates = report.missing_coordinates,
        "station discovery complete"
    );
    Ok(report)
}

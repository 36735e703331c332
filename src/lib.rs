//! waterhub_service: boundary-scoped acquisition of public water data.
//!
//! Discovers monitoring stations inside a boundary polygon, retrieves
//! observations concurrently from USGS NWIS, NOAA CO-OPS, and the EPA
//! Water Quality Portal under per-provider rate limits, and normalizes
//! everything into one common observation schema.
//!
//! # Module structure
//!
//! ```text
//! waterhub_service
//! ├── model        — shared data types (Station, ObservationRecord, AcquireError, …)
//! ├── config       — run configuration loader (run.toml)
//! ├── geometry     — boundary polygon containment + bounding box
//! ├── discovery    — provider catalogs filtered to the boundary
//! ├── ingest
//! │   ├── nwis     — USGS NWIS inventory (RDB) + IV API (JSON)
//! │   ├── coops    — NOAA CO-OPS station catalog + datagetter (JSON)
//! │   ├── wqp      — EPA Water Quality Portal searches (CSV)
//! │   └── fixtures (test only) — representative API response payloads
//! ├── limiter      — per-provider token-bucket rate limiting
//! ├── retry        — bounded retry with exponential backoff
//! ├── normalize    — unit conversion, UTC timestamps, quality flags
//! ├── orchestrator — per-provider worker pools feeding one result channel
//! ├── aggregate    — run summary + combined per-parameter series
//! └── engine       — wires a configured run end to end
//! ```

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod geometry;
pub mod ingest;
pub mod limiter;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod retry;

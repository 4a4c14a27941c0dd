//! Nearby search endpoint
//!
//! Maps to the `buscar_comercios_filtrados` RPC, which applies the spatial
//! filter, the category and open-now filters, and the row limit on the
//! server.

use crate::client::FindixiClient;
use crate::error::ApiResult;
use findixi_discovery::{NearbyQuery, PointOfInterest};
use serde::Serialize;
use tracing::debug;

const RPC_PATH: &str = "rest/v1/rpc/buscar_comercios_filtrados";

/// Nearby search API interface
#[derive(Clone)]
pub struct NearbyApi {
    client: FindixiClient,
}

impl NearbyApi {
    /// Create a new nearby API interface
    pub(crate) fn new(client: FindixiClient) -> Self {
        Self { client }
    }

    /// Records inside the query radius.
    ///
    /// POST /rest/v1/rpc/buscar_comercios_filtrados
    ///
    /// Rows that cannot be decoded as a record are skipped.
    pub async fn search(&self, query: &NearbyQuery) -> ApiResult<Vec<PointOfInterest>> {
        let params = NearbyParams::from(query);
        let rows: Vec<serde_json::Value> = self.client.post(RPC_PATH, &params).await?;
        Ok(decode_rows(rows))
    }
}

fn decode_rows(rows: Vec<serde_json::Value>) -> Vec<PointOfInterest> {
    let total = rows.len();
    let records: Vec<PointOfInterest> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect();

    if records.len() < total {
        debug!(skipped = total - records.len(), "Skipped undecodable nearby rows");
    }
    records
}

/// RPC payload. Unused filters are sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct NearbyParams {
    pub p_texto: Option<String>,
    pub p_municipio: Option<String>,
    pub p_categoria: Option<i64>,
    pub p_subcategoria: Option<i64>,
    pub p_activo: Option<bool>,
    pub p_latitud: f64,
    pub p_longitud: f64,
    /// Radius in kilometers
    pub p_radio: f64,
    pub p_limit: usize,
    pub p_offset: usize,
    pub p_abierto_ahora: Option<bool>,
}

impl From<&NearbyQuery> for NearbyParams {
    fn from(query: &NearbyQuery) -> Self {
        Self {
            p_texto: None,
            p_municipio: None,
            p_categoria: query.category_id,
            p_subcategoria: None,
            p_activo: query.exclude_inactive.then_some(true),
            p_latitud: query.center.latitude,
            p_longitud: query.center.longitude,
            p_radio: query.radius_km,
            p_limit: query.limit.max(1),
            p_offset: 0,
            p_abierto_ahora: query.open_now_only.then_some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use findixi_geo::Coordinate;

    #[test]
    fn test_params_from_query() {
        let query = NearbyQuery {
            center: Coordinate::new(18.4655, -66.1057),
            radius_km: 8.0467,
            category_id: None,
            open_now_only: false,
            exclude_inactive: true,
            limit: 0,
        };

        let json = serde_json::to_value(NearbyParams::from(&query)).unwrap();
        assert_eq!(json["p_radio"], 8.0467);
        assert_eq!(json["p_activo"], true);
        assert!(json["p_abierto_ahora"].is_null());
        assert!(json["p_categoria"].is_null());
        assert_eq!(json["p_limit"], 1);
        assert_eq!(json["p_offset"], 0);
    }

    #[test]
    fn test_undecodable_rows_are_skipped() {
        let rows = vec![
            serde_json::json!({"id": 42, "nombre": "El Mesón", "latitud": 18.2, "longitud": -67.14}),
            serde_json::json!({"id": "n/a", "nombre": "Sin id"}),
            serde_json::json!({"nombre": "Sin id"}),
        ];
        let records = decode_rows(rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 42);
    }
}

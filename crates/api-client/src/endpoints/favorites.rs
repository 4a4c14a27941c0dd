//! Favorites table endpoint

use crate::client::FindixiClient;
use crate::error::ApiResult;
use serde::Deserialize;
use serde_json::Value;

const TABLE_PATH: &str = "rest/v1/favoritosusuarios";

/// Favorites API interface
#[derive(Clone)]
pub struct FavoritesApi {
    client: FindixiClient,
}

#[derive(Debug, Deserialize)]
struct FavoriteRow {
    #[serde(default)]
    idcomercio: Value,
}

impl FavoritesApi {
    /// Create a new favorites API interface
    pub(crate) fn new(client: FindixiClient) -> Self {
        Self { client }
    }

    /// Record ids the user marked as favorite.
    ///
    /// GET /rest/v1/favoritosusuarios?select=idcomercio&idusuario=eq.{user}
    pub async fn ids(&self, user_id: &str) -> ApiResult<Vec<i64>> {
        let path = format!("{TABLE_PATH}?select=idcomercio&idusuario=eq.{user_id}");
        let rows: Vec<FavoriteRow> = self.client.get(&path).await?;
        Ok(rows.iter().filter_map(|row| parse_id(&row.idcomercio)).collect())
    }
}

/// Ids arrive as numbers or numeric strings; anything else, and any
/// non-positive id, is dropped.
#[allow(clippy::cast_possible_truncation)]
fn parse_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (id.is_finite() && id >= 1.0).then(|| id.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&json!(12)), Some(12));
        assert_eq!(parse_id(&json!("34")), Some(34));
        assert_eq!(parse_id(&json!(" 7 ")), Some(7));
        assert_eq!(parse_id(&json!(0)), None);
        assert_eq!(parse_id(&json!(-3)), None);
        assert_eq!(parse_id(&json!("abc")), None);
        assert_eq!(parse_id(&json!(null)), None);
    }

    #[test]
    fn test_rows_decode() {
        let rows: Vec<FavoriteRow> =
            serde_json::from_value(json!([{"idcomercio": 5}, {"idcomercio": "9"}, {}])).unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|row| parse_id(&row.idcomercio)).collect();
        assert_eq!(ids, vec![5, 9]);
    }
}

//! Standard response shapes.

use serde::Serialize;

/// Page of items plus the total count of matching documents (independent of
/// the requested window).
#[derive(Clone, Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, offset: u32, limit: u32) -> Self {
        PaginatedResponse {
            items,
            total,
            offset,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_shape() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 10, 0, 3);
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["total"], 10);
        assert_eq!(v["items"].as_array().unwrap().len(), 3);
        assert_eq!(v["offset"], 0);
        assert_eq!(v["limit"], 3);
    }
}

//! Resource clients for the Mender management API.
//!
//! Each resource borrows a [`Client`](crate::Client) and sends every request
//! through [`Client::execute`](crate::Client::execute), so retries and error
//! classification apply uniformly.

mod deployments;
mod inventory;

pub use deployments::{Deployments, ListDeploymentsQuery, ListReleasesQuery};
pub use inventory::{Inventory, ListDevicesQuery};

/// Joins `base` and the non-empty `parts` with `/`.
pub(crate) fn join_path(base: &str, parts: &[&str]) -> String {
    let mut path = base.trim_end_matches('/').to_string();
    for part in parts.iter().map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        path.push('/');
        path.push_str(part);
    }
    path
}

/// `page` and `per_page` query parameters.
pub(crate) fn page_params(page: u32, per_page: u32) -> Vec<(String, String)> {
    vec![
        ("page".to_string(), page.to_string()),
        ("per_page".to_string(), per_page.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(
            join_path("/api/management/v2/inventory", &["devices", "abc", "group"]),
            "/api/management/v2/inventory/devices/abc/group"
        );
        assert_eq!(join_path("/base/", &["/x/", "", "y"]), "/base/x/y");
        assert_eq!(join_path("/base", &[]), "/base");
    }
}

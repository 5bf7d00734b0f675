//! Inventory API (`/api/management/v2/inventory`).

use super::{join_path, page_params};
use crate::{
    metadata::RequestMetadata,
    models::{
        sort_param, AttributeScope, Device, DeviceAttribute, DeviceSearchFilter, FilterDefinition,
        FilterPredicate, Group, InventoryFilter, SearchResult, SortOrder,
    },
    pagination::{paginate, Page, DEFAULT_PER_PAGE, DEFAULT_STREAM_PER_PAGE},
    Client, Result,
};
use futures_util::Stream;
use http::Method;
use serde::Deserialize;
use serde_json::{json, Value};

const BASE_PATH: &str = "/api/management/v2/inventory";

/// Query of [`Inventory::list_devices`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListDevicesQuery {
    /// 1-based page number.
    pub page: u32,
    /// Devices per page.
    pub per_page: u32,
    /// Attribute name and direction.
    pub sort: Option<(String, SortOrder)>,
    /// Only devices that are (or are not) in some group.
    pub has_group: Option<bool>,
    /// Only devices in this group.
    pub group: Option<String>,
}

impl Default for ListDevicesQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            has_group: None,
            group: None,
        }
    }
}

impl ListDevicesQuery {
    /// Page 1 with the default page size, no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page number and page size.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Sorts by an inventory attribute, sent as `attribute:order`.
    pub fn sort(mut self, attribute: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((attribute.into(), order));
        self
    }

    /// Filters on group membership.
    pub fn has_group(mut self, has_group: bool) -> Self {
        self.has_group = Some(has_group);
        self
    }

    /// Restricts the listing to one group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = page_params(self.page, self.per_page);
        if let Some((attribute, order)) = &self.sort {
            params.push(("sort".to_string(), sort_param(attribute, *order)));
        }
        if let Some(has_group) = self.has_group {
            params.push(("has_group".to_string(), has_group.to_string()));
        }
        if let Some(group) = &self.group {
            params.push(("group".to_string(), group.clone()));
        }
        params
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupsResponse {
    List(Vec<Group>),
    Wrapped { groups: Vec<Group> },
}

/// Devices, attributes, groups and saved filters.
///
/// Obtained with [`Client::inventory`].
#[derive(Debug, Clone, Copy)]
pub struct Inventory<'a> {
    client: &'a Client,
}

impl<'a> Inventory<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(parts: &[&str]) -> String {
        join_path(BASE_PATH, parts)
    }

    // Devices

    /// Lists one page of devices.
    ///
    /// The page carries `X-Total-Count` when the server sends it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mender_sdk::{api::ListDevicesQuery, Client};
    ///
    /// # async fn example() -> Result<(), mender_sdk::Error> {
    /// let client = Client::builder().token("jwt").build()?;
    ///
    /// let page = client
    ///     .inventory()
    ///     .list_devices(&ListDevicesQuery::new().group("production").page(1, 50))
    ///     .await?;
    /// for device in &page.items {
    ///     println!("{}", device.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_devices(&self, query: &ListDevicesQuery) -> Result<Page<Device>> {
        let metadata =
            RequestMetadata::new(Method::GET, Self::path(&["devices"])).with_query_params(query.params());
        let response = self.client.execute(metadata).await?;
        let devices: Vec<Device> = response.json()?;
        Ok(Page::from_response(
            devices,
            &response.headers,
            query.page,
            query.per_page,
        ))
    }

    /// Streams every device matching `query`.
    ///
    /// Starts at page 1; `query.page` is ignored. Pass `None` as `per_page` to
    /// use pages of 100.
    pub fn devices(
        &self,
        query: ListDevicesQuery,
        per_page: Option<u32>,
    ) -> impl Stream<Item = Result<Device>> + 'a {
        let inventory = *self;
        paginate(
            per_page.unwrap_or(DEFAULT_STREAM_PER_PAGE),
            move |page, per_page| {
                let query = query.clone().page(page, per_page);
                async move { inventory.list_devices(&query).await }
            },
        )
    }

    /// Fetches one device with all of its attributes.
    ///
    /// An unknown ID yields [`Error::NotFound`](crate::Error::NotFound).
    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        self.client
            .get(Self::path(&["devices", device_id]), &[])
            .await?
            .json()
    }

    /// Removes a device from the inventory.
    pub async fn delete_device(&self, device_id: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["devices", device_id]))
            .await?;
        Ok(())
    }

    // Attributes

    /// Returns the attributes of a device, in every scope.
    pub async fn device_attributes(&self, device_id: &str) -> Result<Vec<DeviceAttribute>> {
        Ok(self.get_device(device_id).await?.attributes)
    }

    /// Upserts attributes on a device.
    pub async fn update_device_attributes(
        &self,
        device_id: &str,
        attributes: &[DeviceAttribute],
    ) -> Result<()> {
        self.client
            .patch(Self::path(&["devices", device_id, "attributes"]), attributes)
            .await?;
        Ok(())
    }

    /// Upserts a single attribute in `scope`.
    pub async fn set_device_attribute(
        &self,
        device_id: &str,
        name: &str,
        value: impl Into<Value>,
        scope: AttributeScope,
    ) -> Result<()> {
        self.update_device_attributes(device_id, &[DeviceAttribute::new(name, value, scope)])
            .await
    }

    /// Returns the attributes in the `tags` scope.
    pub async fn device_tags(&self, device_id: &str) -> Result<Vec<DeviceAttribute>> {
        let device = self.get_device(device_id).await?;
        Ok(device
            .attributes
            .into_iter()
            .filter(|attr| attr.scope == AttributeScope::Tags)
            .collect())
    }

    /// Sets tags on a device from name/value pairs.
    pub async fn set_device_tags<I, K, V>(&self, device_id: &str, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let attributes: Vec<DeviceAttribute> = tags
            .into_iter()
            .map(|(name, value)| DeviceAttribute::new(name, value, AttributeScope::Tags))
            .collect();
        self.update_device_attributes(device_id, &attributes).await
    }

    // Groups

    /// Lists device groups, optionally restricted to devices with `status`.
    pub async fn list_groups(&self, status: Option<&str>) -> Result<Vec<Group>> {
        let mut metadata = RequestMetadata::new(Method::GET, Self::path(&["groups"]));
        if let Some(status) = status {
            metadata = metadata.with_query_param("status", status);
        }
        let groups = match self.client.execute(metadata).await?.json()? {
            GroupsResponse::List(groups) => groups,
            GroupsResponse::Wrapped { groups } => groups,
        };
        Ok(groups)
    }

    /// Lists one page of device IDs in a group.
    pub async fn group_devices(&self, group: &str, page: u32, per_page: u32) -> Result<Page<String>> {
        let metadata = RequestMetadata::new(Method::GET, Self::path(&["groups", group, "devices"]))
            .with_query_params(page_params(page, per_page));
        let response = self.client.execute(metadata).await?;
        let ids: Vec<String> = response.json()?;
        Ok(Page::from_response(ids, &response.headers, page, per_page))
    }

    /// Returns the group a device belongs to, if any.
    pub async fn device_group(&self, device_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(Self::path(&["devices", device_id, "group"]), &[])
            .await?;
        let body: Option<Value> = response.json_opt()?;
        Ok(body
            .as_ref()
            .and_then(|v| v.get("group"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Moves a device into `group`.
    pub async fn add_device_to_group(&self, device_id: &str, group: &str) -> Result<()> {
        self.client
            .put(
                Self::path(&["devices", device_id, "group"]),
                &json!({ "group": group }),
            )
            .await?;
        Ok(())
    }

    /// Removes a device from `group`.
    pub async fn remove_device_from_group(&self, device_id: &str, group: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["groups", group, "devices", device_id]))
            .await?;
        Ok(())
    }

    /// Removes a device from whatever group it is in.
    pub async fn clear_device_group(&self, device_id: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["devices", device_id, "group"]))
            .await?;
        Ok(())
    }

    /// Adds several devices to `group` in one call.
    pub async fn add_devices_to_group(&self, group: &str, device_ids: &[String]) -> Result<()> {
        self.client
            .patch(Self::path(&["groups", group, "devices"]), device_ids)
            .await?;
        Ok(())
    }

    /// Deletes a group. Its devices become ungrouped.
    pub async fn delete_group(&self, group: &str) -> Result<()> {
        self.client.delete(Self::path(&["groups", group])).await?;
        Ok(())
    }

    // Search and saved filters

    /// Searches devices. All predicates of all filter definitions must hold.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mender_sdk::models::{AttributeScope, DeviceSearchFilter, FilterDefinition, FilterPredicate};
    /// use mender_sdk::Client;
    ///
    /// # async fn example() -> Result<(), mender_sdk::Error> {
    /// let client = Client::builder().token("jwt").build()?;
    ///
    /// let filter = DeviceSearchFilter::new().add_filter(
    ///     FilterDefinition::new()
    ///         .add(FilterPredicate::equals("device_type", "raspberrypi4", AttributeScope::Identity)),
    /// );
    /// let result = client.inventory().search_devices(&filter).await?;
    /// println!("{} matches", result.total_count.unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search_devices(&self, filter: &DeviceSearchFilter) -> Result<SearchResult> {
        let response = self
            .client
            .post(Self::path(&["filters", "search"]), filter)
            .await?;
        Ok(SearchResult {
            devices: response.json()?,
            total_count: response.total_count(),
        })
    }

    /// Searches devices whose `attribute` equals `value`.
    pub async fn search_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Value>,
        scope: AttributeScope,
        page: u32,
        per_page: u32,
    ) -> Result<SearchResult> {
        let filter = DeviceSearchFilter::new()
            .page(page, per_page)
            .add_filter(FilterDefinition::new().add(FilterPredicate::equals(attribute, value, scope)));
        self.search_devices(&filter).await
    }

    /// Lists saved filters.
    pub async fn list_filters(&self) -> Result<Vec<InventoryFilter>> {
        self.client.get(Self::path(&["filters"]), &[]).await?.json()
    }

    /// Fetches a saved filter.
    pub async fn get_filter(&self, filter_id: &str) -> Result<InventoryFilter> {
        self.client
            .get(Self::path(&["filters", filter_id]), &[])
            .await?
            .json()
    }

    /// Saves a filter and returns its ID, taken from the `Location` header.
    pub async fn create_filter(&self, name: &str, terms: &[FilterDefinition]) -> Result<String> {
        let predicates: Vec<&FilterPredicate> =
            terms.iter().flat_map(|t| t.predicates.iter()).collect();
        let response = self
            .client
            .post(
                Self::path(&["filters"]),
                &json!({ "name": name, "terms": predicates }),
            )
            .await?;
        Ok(response.location_id())
    }

    /// Deletes a saved filter.
    pub async fn delete_filter(&self, filter_id: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["filters", filter_id]))
            .await?;
        Ok(())
    }

    /// Attributes that can be used in search predicates.
    pub async fn filterable_attributes(&self) -> Result<Vec<Value>> {
        self.client
            .get(Self::path(&["filters", "attributes"]), &[])
            .await?
            .json()
    }
}

//! Instance discovery for the Scaleway provider.

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::tag::TagFilter;
use crate::volume::Volume;

use super::{PAGE_SIZE, ScalewayProvider, ScalewayProviderError};

const INSTANCE_API_ZONES: &str = "/instance/v1/zones";

#[derive(Debug, Deserialize)]
struct ListServersResponse {
    servers: Vec<ServerSummary>,
}

#[derive(Clone, Debug, Deserialize)]
struct ServerSummary {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Builds one [`Volume`] per attached volume, ordered by numeric slot.
fn volumes_of(server: &ServerSummary, mut attached: Vec<(String, String)>) -> Vec<Volume> {
    attached.sort_by_key(|(slot, _)| (slot.parse::<u32>().unwrap_or(u32::MAX), slot.clone()));
    attached
        .into_iter()
        .map(|(slot, volume_id)| {
            Volume::new(volume_id, server.id.clone(), slot)
                .instance_name(server.name.clone())
                .tags(server.tags.clone())
        })
        .collect()
}

impl ScalewayProvider {
    async fn list_tagged_servers(
        &self,
        filter: &TagFilter,
    ) -> Result<Vec<ServerSummary>, ScalewayProviderError> {
        let path = format!("{INSTANCE_API_ZONES}/{}/servers", self.zone());
        let mut servers = Vec::new();
        let mut page = 1_u32;
        loop {
            let query = [
                ("project", self.project_id().to_owned()),
                ("tags", filter.provider_tag()),
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            let response: ListServersResponse = self
                .call::<_, ()>(Method::GET, &path, &query, None)
                .await?;
            let fetched = response.servers.len();
            servers.extend(response.servers);
            if u32::try_from(fetched).unwrap_or(u32::MAX) < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(servers)
    }

    async fn attached_volumes(
        &self,
        server: &ServerSummary,
    ) -> Result<Vec<(String, String)>, ScalewayProviderError> {
        let instance = self.api.get_instance_async(self.zone(), &server.id).await?;
        Ok(instance
            .volumes
            .volumes
            .iter()
            .map(|(slot, volume)| (slot.clone(), volume.id.clone()))
            .collect())
    }

    pub(super) async fn discover_tagged_volumes(
        &self,
        filter: &TagFilter,
    ) -> Result<Vec<Volume>, ScalewayProviderError> {
        let servers = self.list_tagged_servers(filter).await?;
        debug!(tag = %filter, servers = servers.len(), "found tagged instances");

        let mut volumes = Vec::new();
        for server in &servers {
            let attached = self.attached_volumes(server).await?;
            if attached.is_empty() {
                warn!(instance_id = %server.id, "tagged instance has no volumes, skipping");
                continue;
            }
            volumes.extend(volumes_of(server, attached));
        }
        Ok(volumes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerSummary {
        ServerSummary {
            id: String::from("srv-1"),
            name: Some(String::from("web-01")),
            tags: vec![String::from("Lifecycle=legacy")],
        }
    }

    #[test]
    fn volumes_are_ordered_by_numeric_slot() {
        let attached = vec![
            (String::from("10"), String::from("vol-c")),
            (String::from("0"), String::from("vol-a")),
            (String::from("2"), String::from("vol-b")),
        ];

        let volumes = volumes_of(&server(), attached);

        let ids: Vec<&str> = volumes.iter().map(|volume| volume.id.as_str()).collect();
        assert_eq!(ids, ["vol-a", "vol-b", "vol-c"]);
        let devices: Vec<&str> = volumes.iter().map(|volume| volume.device.as_str()).collect();
        assert_eq!(devices, ["0", "2", "10"]);
    }

    #[test]
    fn volumes_carry_owner_details() {
        let volumes = volumes_of(&server(), vec![(String::from("0"), String::from("vol-a"))]);

        let volume = volumes.first().expect("one volume");
        assert_eq!(volume.instance_id, "srv-1");
        assert_eq!(volume.owner_label(), "web-01");
        assert_eq!(volume.tags, ["Lifecycle=legacy"]);
    }

    #[test]
    fn server_listing_parses_minimal_payload() {
        let body = r#"{"servers": [
            {"id": "srv-1", "name": "web-01", "tags": ["Lifecycle=legacy"], "state": "running"},
            {"id": "srv-2"}
        ]}"#;

        let response: ListServersResponse = serde_json::from_str(body).expect("parse servers");

        let ids: Vec<&str> = response
            .servers
            .iter()
            .map(|server| server.id.as_str())
            .collect();
        assert_eq!(ids, ["srv-1", "srv-2"]);
        let unnamed = response.servers.get(1).expect("second server");
        assert!(unnamed.name.is_none());
        assert!(unnamed.tags.is_empty());
    }
}

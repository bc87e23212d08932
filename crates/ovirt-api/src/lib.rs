//! Typed Rust client for the oVirt engine REST API.
//!
//! Covers the subset needed for provisioning cluster machines: VMs (create,
//! get, search, start, stop, remove), disk attachments, NICs, tags, affinity
//! groups, hosts, guest reported devices, instance types and product info.
//!
//! All requests use the JSON representation (`Accept: application/json`).

mod types;

use std::path::PathBuf;

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use reqwest::StatusCode;
pub use types::*;
use types::{
    AffinityGroupList, ApiRoot, DiskAttachmentList, Fault, HostList, NicList,
    ReportedDeviceList, VmList,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ovirt api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ovirt api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("ovirt api {endpoint} returned an undecodable body: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The engine answered with a different element than the one requested.
    #[error("response tag mismatch: expected <{expected}>, got <{actual}>")]
    TagMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("failed to read CA bundle {}: {source}", path.display())]
    CaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// True for the mismatch the engine produces when a membership add
    /// returns an `<action>` instead of the added `<vm>`.
    pub fn is_action_tag_mismatch(&self, expected: &str) -> bool {
        matches!(self, Self::TagMismatch { expected: e, actual: "action" } if *e == expected)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Connection parameters for an engine.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// API root, e.g. `https://engine.example.com/ovirt-engine/api`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Extra PEM root certificate trusted for the engine's TLS endpoint.
    pub ca_file: Option<PathBuf>,
    pub insecure: bool,
}

/// Client for the oVirt engine REST API.
#[derive(Clone)]
pub struct OvirtClient {
    base: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl OvirtClient {
    pub fn connect(creds: &Credentials) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        if let Some(path) = &creds.ca_file {
            let pem = std::fs::read(path).map_err(|source| Error::CaFile {
                path: path.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        if creds.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            base: creds.url.trim_end_matches('/').to_string(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            http: builder.build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .header("Version", "4")
    }

    fn with_body<B: Serialize>(builder: reqwest::RequestBuilder, body: &B) -> reqwest::RequestBuilder {
        builder.header(CONTENT_TYPE, "application/json").json(body)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let body = match serde_json::from_str::<Fault>(&raw) {
                Ok(Fault {
                    reason: Some(reason),
                    detail,
                }) => match detail {
                    Some(detail) => format!("{reason}: {detail}"),
                    None => reason,
                },
                _ => raw,
            };
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    async fn entity<T: DeserializeOwned>(
        resp: reqwest::Response,
        endpoint: &'static str,
        tag: &'static str,
    ) -> Result<T> {
        let body = Self::check(resp, endpoint).await?.text().await?;
        decode(endpoint, tag, &body)
    }

    // ── VMs ──────────────────────────────────────────────────────────

    pub async fn create_vm(&self, vm: &NewVm) -> Result<Vm> {
        let resp = Self::with_body(self.request(Method::POST, "/vms"), vm)
            .send()
            .await?;
        Self::entity(resp, "create vm", "vm").await
    }

    pub async fn get_vm(&self, vm_id: &str) -> Result<Vm> {
        let resp = self
            .request(Method::GET, &format!("/vms/{vm_id}"))
            .send()
            .await?;
        Self::entity(resp, "get vm", "vm").await
    }

    /// Run an engine search query (e.g. `name=worker-0`) against VMs.
    pub async fn search_vms(&self, query: &str) -> Result<Vec<Vm>> {
        let resp = self
            .request(Method::GET, "/vms")
            .query(&[("search", query)])
            .send()
            .await?;
        let list: VmList = Self::entity(resp, "search vms", "vms").await?;
        Ok(list.vm)
    }

    pub async fn start_vm(&self, vm_id: &str) -> Result<()> {
        self.action(&format!("/vms/{vm_id}/start"), "start vm", &Action::default())
            .await
    }

    pub async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        self.action(&format!("/vms/{vm_id}/stop"), "stop vm", &Action::default())
            .await
    }

    pub async fn remove_vm(&self, vm_id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, &format!("/vms/{vm_id}"))
            .send()
            .await?;
        Self::check(resp, "remove vm").await?;
        Ok(())
    }

    pub async fn auto_pin_cpu_and_numa_nodes(&self, vm_id: &str, optimize_cpu_settings: bool) -> Result<()> {
        self.action(
            &format!("/vms/{vm_id}/autopincpuandnumanodes"),
            "auto pin cpu and numa nodes",
            &Action {
                optimize_cpu_settings: Some(optimize_cpu_settings),
            },
        )
        .await
    }

    async fn action(&self, path: &str, endpoint: &'static str, action: &Action) -> Result<()> {
        let resp = Self::with_body(self.request(Method::POST, path), action)
            .send()
            .await?;
        Self::check(resp, endpoint).await?;
        Ok(())
    }

    // ── Disks ────────────────────────────────────────────────────────

    pub async fn list_disk_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>> {
        let resp = self
            .request(Method::GET, &format!("/vms/{vm_id}/diskattachments"))
            .send()
            .await?;
        let list: DiskAttachmentList =
            Self::entity(resp, "list disk attachments", "disk_attachments").await?;
        Ok(list.disk_attachment)
    }

    pub async fn update_disk_attachment(
        &self,
        vm_id: &str,
        attachment_id: &str,
        update: &DiskAttachmentUpdate,
    ) -> Result<DiskAttachment> {
        let resp = Self::with_body(
            self.request(
                Method::PUT,
                &format!("/vms/{vm_id}/diskattachments/{attachment_id}"),
            ),
            update,
        )
        .send()
        .await?;
        Self::entity(resp, "update disk attachment", "disk_attachment").await
    }

    pub async fn get_disk(&self, disk_id: &str) -> Result<Disk> {
        let resp = self
            .request(Method::GET, &format!("/disks/{disk_id}"))
            .send()
            .await?;
        Self::entity(resp, "get disk", "disk").await
    }

    // ── NICs ─────────────────────────────────────────────────────────

    pub async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>> {
        let resp = self
            .request(Method::GET, &format!("/vms/{vm_id}/nics"))
            .send()
            .await?;
        let list: NicList = Self::entity(resp, "list nics", "nics").await?;
        Ok(list.nic)
    }

    pub async fn add_nic(&self, vm_id: &str, nic: &NewNic) -> Result<Nic> {
        let resp = Self::with_body(self.request(Method::POST, &format!("/vms/{vm_id}/nics")), nic)
            .send()
            .await?;
        Self::entity(resp, "add nic", "nic").await
    }

    pub async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, &format!("/vms/{vm_id}/nics/{nic_id}"))
            .send()
            .await?;
        Self::check(resp, "remove nic").await?;
        Ok(())
    }

    // ── Tags ─────────────────────────────────────────────────────────

    pub async fn add_tag(&self, vm_id: &str, name: &str) -> Result<Tag> {
        let resp = Self::with_body(
            self.request(Method::POST, &format!("/vms/{vm_id}/tags")),
            &NewTag { name: name.into() },
        )
        .send()
        .await?;
        Self::entity(resp, "add tag", "tag").await
    }

    // ── Clusters, hosts, affinity groups ─────────────────────────────

    pub async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        let resp = self
            .request(Method::GET, &format!("/clusters/{cluster_id}"))
            .send()
            .await?;
        Self::entity(resp, "get cluster", "cluster").await
    }

    /// Run an engine search query (e.g. `cluster=Default`) against hosts.
    pub async fn search_hosts(&self, query: &str) -> Result<Vec<Host>> {
        let resp = self
            .request(Method::GET, "/hosts")
            .query(&[("search", query)])
            .send()
            .await?;
        let list: HostList = Self::entity(resp, "search hosts", "hosts").await?;
        Ok(list.host)
    }

    pub async fn list_affinity_groups(&self, cluster_id: &str) -> Result<Vec<AffinityGroup>> {
        let resp = self
            .request(Method::GET, &format!("/clusters/{cluster_id}/affinitygroups"))
            .send()
            .await?;
        let list: AffinityGroupList =
            Self::entity(resp, "list affinity groups", "affinity_groups").await?;
        Ok(list.affinity_group)
    }

    pub async fn add_vm_to_affinity_group(
        &self,
        cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> Result<Vm> {
        let resp = Self::with_body(
            self.request(
                Method::POST,
                &format!("/clusters/{cluster_id}/affinitygroups/{group_id}/vms"),
            ),
            &Link::id(vm_id),
        )
        .send()
        .await?;
        Self::entity(resp, "add vm to affinity group", "vm").await
    }

    // ── Guest info ───────────────────────────────────────────────────

    pub async fn list_reported_devices(&self, vm_id: &str) -> Result<Vec<ReportedDevice>> {
        let resp = self
            .request(Method::GET, &format!("/vms/{vm_id}/reporteddevices"))
            .send()
            .await?;
        let list: ReportedDeviceList =
            Self::entity(resp, "list reported devices", "reported_devices").await?;
        Ok(list.reported_device)
    }

    // ── Instance types & product info ────────────────────────────────

    pub async fn get_instance_type(&self, id: &str) -> Result<InstanceType> {
        let resp = self
            .request(Method::GET, &format!("/instancetypes/{id}"))
            .send()
            .await?;
        Self::entity(resp, "get instance type", "instance_type").await
    }

    pub async fn product_info(&self) -> Result<ProductInfo> {
        let resp = self.request(Method::GET, "/").send().await?;
        let root: ApiRoot = Self::entity(resp, "get api", "api").await?;
        root.product_info.ok_or(Error::Api {
            endpoint: "get api",
            status: StatusCode::OK,
            body: "response carries no product_info".into(),
        })
    }
}

/// Decode an entity, reporting an element-kind mismatch separately from
/// plain malformed bodies.
fn decode<T: DeserializeOwned>(endpoint: &'static str, tag: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| match element_kind(body) {
        Some(actual) if actual != tag => Error::TagMismatch {
            expected: tag,
            actual,
        },
        _ => Error::Decode { endpoint, source },
    })
}

/// Best-effort guess at which element kind a JSON body represents.
fn element_kind(body: &str) -> Option<&'static str> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;
    if obj.contains_key("fault") || (obj.contains_key("reason") && obj.contains_key("detail")) {
        Some("fault")
    } else if obj.contains_key("status") && !obj.contains_key("id") {
        Some("action")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_body_is_a_tag_mismatch() {
        let err = decode::<Vm>("add vm to affinity group", "vm", r#"{"status": "complete"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TagMismatch {
                expected: "vm",
                actual: "action"
            }
        ));
        assert!(err.is_action_tag_mismatch("vm"));
        assert!(!err.is_action_tag_mismatch("nic"));
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = decode::<Vm>("get vm", "vm", r#"{"name": "no id"}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { endpoint: "get vm", .. }));
        assert!(!err.is_action_tag_mismatch("vm"));
    }

    #[test]
    fn not_found_detection() {
        let err = Error::Api {
            endpoint: "get vm",
            status: StatusCode::NOT_FOUND,
            body: "Not Found".into(),
        };
        assert!(err.is_not_found());

        let err = Error::Api {
            endpoint: "get vm",
            status: StatusCode::CONFLICT,
            body: "Operation Failed".into(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn connect_trims_trailing_slash() {
        let client = OvirtClient::connect(&Credentials {
            url: "https://engine.example.com/ovirt-engine/api/".into(),
            username: "admin@internal".into(),
            password: "secret".into(),
            ca_file: None,
            insecure: false,
        })
        .unwrap();
        assert_eq!(
            client.url("/vms"),
            "https://engine.example.com/ovirt-engine/api/vms"
        );
    }

    #[test]
    fn missing_ca_file_is_reported() {
        let err = OvirtClient::connect(&Credentials {
            url: "https://engine.example.com/ovirt-engine/api".into(),
            username: "admin@internal".into(),
            password: "secret".into(),
            ca_file: Some("/nonexistent/ca.pem".into()),
            insecure: false,
        })
        .err()
        .unwrap();
        assert!(matches!(err, Error::CaFile { .. }));
    }
}

//! In-memory [`Platform`] used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ovirt_api::{
    AffinityGroup, Cluster, Disk, DiskAttachment, DiskAttachmentUpdate, DiskStatus, Error, Host,
    InstanceType, Ips, Ip, Link, NewNic, NewVm, Nic, ProductInfo, ReportedDevice, Result, Tag,
    Version, Vm, VmStatus,
};

use crate::Platform;
use crate::spec::{CpuSpec, DiskSpec, MachineSpec, SecretRef};

pub(crate) const GIB: i64 = 1 << 30;

#[derive(Default)]
pub(crate) struct State {
    pub vms: HashMap<String, Vm>,
    pub attachments: HashMap<String, Vec<DiskAttachment>>,
    pub disks: HashMap<String, Disk>,
    pub nics: HashMap<String, Vec<Nic>>,
    pub clusters: HashMap<String, Cluster>,
    /// (cluster name, host)
    pub hosts: Vec<(String, Host)>,
    pub affinity_groups: HashMap<String, Vec<AffinityGroup>>,
    pub members: Vec<(String, String)>,
    pub tags: HashMap<String, Vec<String>>,
    pub instance_types: HashMap<String, InstanceType>,
    pub devices: HashMap<String, Vec<ReportedDevice>>,
    pub created: Vec<NewVm>,
    pub calls: Vec<String>,
    /// Operations that fail with a 500.
    pub failing: HashSet<&'static str>,
    /// Boot disk size given to newly created VMs; `None` creates no disk.
    pub template_disk: Option<i64>,
    /// NIC names every newly created VM starts with.
    pub template_nics: Vec<String>,
    /// Reads of a resized disk that still report `locked`.
    pub disk_lock_reads: u32,
    /// Reads of a newly created VM that still report `image_locked`.
    pub settle_reads: u32,
    /// Affinity membership adds answer with an `<action>` element.
    pub membership_tag_quirk: bool,
    /// `stop` leaves the VM running.
    pub stop_is_ignored: bool,
    /// `remove` leaves the VM in place.
    pub remove_is_ignored: bool,
    next_id: u32,
}

pub(crate) struct FakePlatform {
    pub state: Mutex<State>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        let state = State {
            template_disk: Some(10 * GIB),
            template_nics: vec!["nic1".into()],
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }
}

pub(crate) fn vm(id: &str, name: &str, status: VmStatus) -> Vm {
    Vm {
        id: id.into(),
        name: name.into(),
        status: Some(status),
        vm_type: None,
        memory: None,
        creation_time: None,
        cluster: None,
        template: None,
        cpu: None,
    }
}

pub(crate) fn device(name: &str, addresses: &[&str]) -> ReportedDevice {
    ReportedDevice {
        name: Some(name.into()),
        ips: Some(Ips {
            ip: addresses
                .iter()
                .map(|a| Ip {
                    address: Some((*a).into()),
                    version: None,
                })
                .collect(),
        }),
    }
}

/// Spec with explicit sizing that passes validation.
pub(crate) fn valid_spec() -> MachineSpec {
    MachineSpec {
        cluster_id: "46991e3f-8752-4ab6-9f2d-c37a98358d52".into(),
        template_name: "rhcos".into(),
        vm_type: "server".into(),
        cpu: Some(CpuSpec {
            cores: 4,
            sockets: 1,
            threads: 1,
        }),
        memory_mb: 16348,
        os_disk: Some(DiskSpec { size_gb: 31 }),
        user_data_secret: Some(SecretRef {
            name: "top secret user data".into(),
        }),
        ..MachineSpec::default()
    }
}

fn injected(endpoint: &'static str) -> Error {
    Error::Api {
        endpoint,
        status: reqwest_status(500),
        body: "injected failure".into(),
    }
}

fn not_found(endpoint: &'static str) -> Error {
    Error::Api {
        endpoint,
        status: reqwest_status(404),
        body: "Not Found".into(),
    }
}

fn reqwest_status(code: u16) -> ovirt_api::StatusCode {
    ovirt_api::StatusCode::from_u16(code).unwrap()
}

impl FakePlatform {
    pub fn with(f: impl FnOnce(&mut State)) -> Self {
        let fake = Self::default();
        f(&mut fake.state.lock().unwrap());
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    pub fn insert_vm(&self, vm: Vm) {
        self.state.lock().unwrap().vms.insert(vm.id.clone(), vm);
    }

    pub fn add_boot_disk(&self, vm_id: &str, disk_id: &str, size: i64) {
        let mut s = self.state.lock().unwrap();
        s.attachments
            .entry(vm_id.into())
            .or_default()
            .push(DiskAttachment {
                id: disk_id.into(),
                bootable: true,
                active: true,
                disk: Some(Link::id(disk_id)),
            });
        s.disks.insert(
            disk_id.into(),
            Disk {
                id: disk_id.into(),
                name: None,
                provisioned_size: size,
                status: Some(DiskStatus::Ok),
            },
        );
    }

    pub fn add_nic_named(&self, vm_id: &str, nic_id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .nics
            .entry(vm_id.into())
            .or_default()
            .push(Nic {
                id: nic_id.into(),
                name: name.into(),
                vnic_profile: None,
            });
    }

    pub fn add_cluster(&self, id: &str, name: &str, hosts: &[&str]) {
        let mut s = self.state.lock().unwrap();
        s.clusters.insert(
            id.into(),
            Cluster {
                id: id.into(),
                name: name.into(),
            },
        );
        for h in hosts {
            s.hosts.push((
                name.into(),
                Host {
                    id: (*h).into(),
                    name: (*h).into(),
                },
            ));
        }
    }

    pub fn add_affinity_group(&self, cluster_id: &str, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .affinity_groups
            .entry(cluster_id.into())
            .or_default()
            .push(AffinityGroup {
                id: id.into(),
                name: name.into(),
            });
    }

    fn call(&self, op: &'static str, detail: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(format!("{op}:{detail}"));
        if s.failing.contains(op) {
            return Err(injected(op));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_vm(&self, new: &NewVm) -> Result<Vm> {
        self.call("create_vm", &new.name)?;
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        let id = format!("vm-{}", s.next_id);
        let status = if s.settle_reads > 0 {
            VmStatus::ImageLocked
        } else {
            VmStatus::Down
        };
        let created = vm(&id, &new.name, status);
        s.vms.insert(id.clone(), created.clone());
        s.created.push(new.clone());

        if let Some(size) = s.template_disk {
            let disk_id = format!("disk-{id}");
            s.attachments.insert(
                id.clone(),
                vec![DiskAttachment {
                    id: disk_id.clone(),
                    bootable: true,
                    active: true,
                    disk: Some(Link::id(&disk_id)),
                }],
            );
            s.disks.insert(
                disk_id.clone(),
                Disk {
                    id: disk_id,
                    name: None,
                    provisioned_size: size,
                    status: Some(DiskStatus::Ok),
                },
            );
        }
        let nics = s
            .template_nics
            .iter()
            .enumerate()
            .map(|(i, name)| Nic {
                id: format!("{id}-tmpl-nic-{i}"),
                name: name.clone(),
                vnic_profile: None,
            })
            .collect();
        s.nics.insert(id, nics);
        Ok(created)
    }

    async fn get_vm(&self, vm_id: &str) -> Result<Vm> {
        self.call("get_vm", vm_id)?;
        let mut s = self.state.lock().unwrap();
        let settling = s.settle_reads > 0;
        let vm = s.vms.get_mut(vm_id).ok_or_else(|| not_found("get vm"))?;
        let snapshot = vm.clone();
        if vm.status == Some(VmStatus::ImageLocked) {
            if settling {
                s.settle_reads -= 1;
            } else {
                vm.status = Some(VmStatus::Down);
                return Ok(vm.clone());
            }
        }
        Ok(snapshot)
    }

    async fn search_vms(&self, query: &str) -> Result<Vec<Vm>> {
        self.call("search_vms", query)?;
        let name = query.trim_start_matches("name=");
        // The engine's name search is a pattern match, so return prefix hits too.
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .values()
            .filter(|vm| vm.name.starts_with(name))
            .cloned()
            .collect())
    }

    async fn start_vm(&self, vm_id: &str) -> Result<()> {
        self.call("start_vm", vm_id)?;
        let mut s = self.state.lock().unwrap();
        let vm = s.vms.get_mut(vm_id).ok_or_else(|| not_found("start vm"))?;
        vm.status = Some(VmStatus::Up);
        Ok(())
    }

    async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        self.call("stop_vm", vm_id)?;
        let mut s = self.state.lock().unwrap();
        let ignored = s.stop_is_ignored;
        let vm = s.vms.get_mut(vm_id).ok_or_else(|| not_found("stop vm"))?;
        if !ignored {
            vm.status = Some(VmStatus::Down);
        }
        Ok(())
    }

    async fn remove_vm(&self, vm_id: &str) -> Result<()> {
        self.call("remove_vm", vm_id)?;
        let mut s = self.state.lock().unwrap();
        if !s.vms.contains_key(vm_id) {
            return Err(not_found("remove vm"));
        }
        if !s.remove_is_ignored {
            s.vms.remove(vm_id);
        }
        Ok(())
    }

    async fn list_disk_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>> {
        self.call("list_disk_attachments", vm_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .attachments
            .get(vm_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_disk_attachment(
        &self,
        vm_id: &str,
        attachment_id: &str,
        update: &DiskAttachmentUpdate,
    ) -> Result<DiskAttachment> {
        self.call(
            "update_disk_attachment",
            &format!("{attachment_id}={}", update.disk.provisioned_size),
        )?;
        let mut s = self.state.lock().unwrap();
        let attachment = s
            .attachments
            .get(vm_id)
            .and_then(|list| list.iter().find(|a| a.id == attachment_id))
            .cloned()
            .ok_or_else(|| not_found("update disk attachment"))?;
        let locked = s.disk_lock_reads > 0;
        let disk = s
            .disks
            .get_mut(attachment_id)
            .ok_or_else(|| not_found("update disk attachment"))?;
        disk.provisioned_size = update.disk.provisioned_size;
        if locked {
            disk.status = Some(DiskStatus::Locked);
        }
        Ok(attachment)
    }

    async fn get_disk(&self, disk_id: &str) -> Result<Disk> {
        self.call("get_disk", disk_id)?;
        let mut s = self.state.lock().unwrap();
        if s.disk_lock_reads > 0 {
            if matches!(s.disks.get(disk_id).and_then(|d| d.status), Some(DiskStatus::Locked)) {
                s.disk_lock_reads -= 1;
            }
        } else if let Some(disk) = s.disks.get_mut(disk_id) {
            disk.status = Some(DiskStatus::Ok);
        }
        s.disks.get(disk_id).cloned().ok_or_else(|| not_found("get disk"))
    }

    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>> {
        self.call("list_nics", vm_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .nics
            .get(vm_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_nic(&self, vm_id: &str, nic: &NewNic) -> Result<Nic> {
        let profile = nic.vnic_profile.id.clone().unwrap_or_default();
        self.call("add_nic", &format!("{}={profile}", nic.name))?;
        let mut s = self.state.lock().unwrap();
        let list = s.nics.entry(vm_id.into()).or_default();
        let created = Nic {
            id: format!("{vm_id}-{}", nic.name),
            name: nic.name.clone(),
            vnic_profile: Some(nic.vnic_profile.clone()),
        };
        list.push(created.clone());
        Ok(created)
    }

    async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()> {
        self.call("remove_nic", nic_id)?;
        let mut s = self.state.lock().unwrap();
        let list = s.nics.entry(vm_id.into()).or_default();
        let before = list.len();
        list.retain(|n| n.id != nic_id);
        if list.len() == before {
            return Err(not_found("remove nic"));
        }
        Ok(())
    }

    async fn add_tag(&self, vm_id: &str, name: &str) -> Result<Tag> {
        self.call("add_tag", name)?;
        self.state
            .lock()
            .unwrap()
            .tags
            .entry(vm_id.into())
            .or_default()
            .push(name.into());
        Ok(Tag {
            id: format!("tag-{name}"),
            name: name.into(),
        })
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        self.call("get_cluster", cluster_id)?;
        self.state
            .lock()
            .unwrap()
            .clusters
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| not_found("get cluster"))
    }

    async fn search_hosts(&self, query: &str) -> Result<Vec<Host>> {
        self.call("search_hosts", query)?;
        let cluster = query.trim_start_matches("cluster=");
        Ok(self
            .state
            .lock()
            .unwrap()
            .hosts
            .iter()
            .filter(|(c, _)| c == cluster)
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn list_affinity_groups(&self, cluster_id: &str) -> Result<Vec<AffinityGroup>> {
        self.call("list_affinity_groups", cluster_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .affinity_groups
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_vm_to_affinity_group(
        &self,
        _cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> Result<Vm> {
        self.call("add_vm_to_affinity_group", group_id)?;
        let mut s = self.state.lock().unwrap();
        s.members.push((group_id.into(), vm_id.into()));
        if s.membership_tag_quirk {
            return Err(Error::TagMismatch {
                expected: "vm",
                actual: "action",
            });
        }
        s.vms.get(vm_id).cloned().ok_or_else(|| not_found("add vm to affinity group"))
    }

    async fn auto_pin_cpu_and_numa_nodes(&self, vm_id: &str, optimize_cpu_settings: bool) -> Result<()> {
        self.call(
            "auto_pin_cpu_and_numa_nodes",
            &format!("{vm_id}={optimize_cpu_settings}"),
        )
    }

    async fn list_reported_devices(&self, vm_id: &str) -> Result<Vec<ReportedDevice>> {
        self.call("list_reported_devices", vm_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .devices
            .get(vm_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_instance_type(&self, id: &str) -> Result<InstanceType> {
        self.call("get_instance_type", id)?;
        self.state
            .lock()
            .unwrap()
            .instance_types
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("get instance type"))
    }

    async fn product_info(&self) -> Result<ProductInfo> {
        self.call("product_info", "")?;
        Ok(ProductInfo {
            name: Some("oVirt Engine".into()),
            version: Some(Version {
                major: 4,
                minor: 5,
                build: 4,
                revision: 0,
                full_version: None,
            }),
        })
    }
}

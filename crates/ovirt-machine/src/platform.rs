use async_trait::async_trait;
use ovirt_api::{
    AffinityGroup, Cluster, Disk, DiskAttachment, DiskAttachmentUpdate, Host, InstanceType,
    NewNic, NewVm, Nic, OvirtClient, ProductInfo, ReportedDevice, Result, Tag, Vm,
};

/// Engine operations the orchestrator depends on.
///
/// Every decision re-reads engine state through this trait; nothing is cached
/// between calls.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    async fn create_vm(&self, vm: &NewVm) -> Result<Vm>;

    async fn get_vm(&self, vm_id: &str) -> Result<Vm>;

    /// Engine search over VMs, e.g. `name=worker-0`.
    async fn search_vms(&self, query: &str) -> Result<Vec<Vm>>;

    async fn start_vm(&self, vm_id: &str) -> Result<()>;

    async fn stop_vm(&self, vm_id: &str) -> Result<()>;

    async fn remove_vm(&self, vm_id: &str) -> Result<()>;

    async fn list_disk_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>>;

    async fn update_disk_attachment(
        &self,
        vm_id: &str,
        attachment_id: &str,
        update: &DiskAttachmentUpdate,
    ) -> Result<DiskAttachment>;

    async fn get_disk(&self, disk_id: &str) -> Result<Disk>;

    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>>;

    async fn add_nic(&self, vm_id: &str, nic: &NewNic) -> Result<Nic>;

    async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()>;

    async fn add_tag(&self, vm_id: &str, name: &str) -> Result<Tag>;

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster>;

    /// Engine search over hosts, e.g. `cluster=Default`.
    async fn search_hosts(&self, query: &str) -> Result<Vec<Host>>;

    async fn list_affinity_groups(&self, cluster_id: &str) -> Result<Vec<AffinityGroup>>;

    async fn add_vm_to_affinity_group(
        &self,
        cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> Result<Vm>;

    async fn auto_pin_cpu_and_numa_nodes(&self, vm_id: &str, optimize_cpu_settings: bool) -> Result<()>;

    async fn list_reported_devices(&self, vm_id: &str) -> Result<Vec<ReportedDevice>>;

    async fn get_instance_type(&self, id: &str) -> Result<InstanceType>;

    async fn product_info(&self) -> Result<ProductInfo>;
}

#[async_trait]
impl Platform for OvirtClient {
    async fn create_vm(&self, vm: &NewVm) -> Result<Vm> {
        OvirtClient::create_vm(self, vm).await
    }

    async fn get_vm(&self, vm_id: &str) -> Result<Vm> {
        OvirtClient::get_vm(self, vm_id).await
    }

    async fn search_vms(&self, query: &str) -> Result<Vec<Vm>> {
        OvirtClient::search_vms(self, query).await
    }

    async fn start_vm(&self, vm_id: &str) -> Result<()> {
        OvirtClient::start_vm(self, vm_id).await
    }

    async fn stop_vm(&self, vm_id: &str) -> Result<()> {
        OvirtClient::stop_vm(self, vm_id).await
    }

    async fn remove_vm(&self, vm_id: &str) -> Result<()> {
        OvirtClient::remove_vm(self, vm_id).await
    }

    async fn list_disk_attachments(&self, vm_id: &str) -> Result<Vec<DiskAttachment>> {
        OvirtClient::list_disk_attachments(self, vm_id).await
    }

    async fn update_disk_attachment(
        &self,
        vm_id: &str,
        attachment_id: &str,
        update: &DiskAttachmentUpdate,
    ) -> Result<DiskAttachment> {
        OvirtClient::update_disk_attachment(self, vm_id, attachment_id, update).await
    }

    async fn get_disk(&self, disk_id: &str) -> Result<Disk> {
        OvirtClient::get_disk(self, disk_id).await
    }

    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>> {
        OvirtClient::list_nics(self, vm_id).await
    }

    async fn add_nic(&self, vm_id: &str, nic: &NewNic) -> Result<Nic> {
        OvirtClient::add_nic(self, vm_id, nic).await
    }

    async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()> {
        OvirtClient::remove_nic(self, vm_id, nic_id).await
    }

    async fn add_tag(&self, vm_id: &str, name: &str) -> Result<Tag> {
        OvirtClient::add_tag(self, vm_id, name).await
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        OvirtClient::get_cluster(self, cluster_id).await
    }

    async fn search_hosts(&self, query: &str) -> Result<Vec<Host>> {
        OvirtClient::search_hosts(self, query).await
    }

    async fn list_affinity_groups(&self, cluster_id: &str) -> Result<Vec<AffinityGroup>> {
        OvirtClient::list_affinity_groups(self, cluster_id).await
    }

    async fn add_vm_to_affinity_group(
        &self,
        cluster_id: &str,
        group_id: &str,
        vm_id: &str,
    ) -> Result<Vm> {
        OvirtClient::add_vm_to_affinity_group(self, cluster_id, group_id, vm_id).await
    }

    async fn auto_pin_cpu_and_numa_nodes(&self, vm_id: &str, optimize_cpu_settings: bool) -> Result<()> {
        OvirtClient::auto_pin_cpu_and_numa_nodes(self, vm_id, optimize_cpu_settings).await
    }

    async fn list_reported_devices(&self, vm_id: &str) -> Result<Vec<ReportedDevice>> {
        OvirtClient::list_reported_devices(self, vm_id).await
    }

    async fn get_instance_type(&self, id: &str) -> Result<InstanceType> {
        OvirtClient::get_instance_type(self, id).await
    }

    async fn product_info(&self) -> Result<ProductInfo> {
        OvirtClient::product_info(self).await
    }
}

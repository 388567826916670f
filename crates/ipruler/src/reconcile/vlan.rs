use crate::desired::VlanSpec;
use crate::kernel::Kernel;
use crate::netlink::Result;

use super::Resource;

// VLANs live outside routing tables, so hard-sync never touches them.
impl Resource for VlanSpec {
    const KIND: &'static str = "vlan";
    const HARD_SYNC: bool = false;

    fn matches(&self, other: &Self) -> bool {
        VlanSpec::matches(self, other)
    }

    fn table(&self) -> Option<u32> {
        None
    }

    async fn list<K: Kernel>(kernel: &K, _table: Option<u32>) -> Result<Vec<Self>> {
        kernel.vlans().await
    }

    async fn add<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.add_vlan(self).await
    }

    async fn delete<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.del_vlan(self).await
    }

    async fn after_add<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.set_up(&self.name).await
    }
}

use crate::desired::RouteSpec;
use crate::kernel::Kernel;
use crate::netlink::Result;

use super::Resource;

impl Resource for RouteSpec {
    const KIND: &'static str = "route";

    fn matches(&self, other: &Self) -> bool {
        RouteSpec::matches(self, other)
    }

    fn table(&self) -> Option<u32> {
        Some(self.table)
    }

    async fn list<K: Kernel>(kernel: &K, table: Option<u32>) -> Result<Vec<Self>> {
        kernel.routes(table).await
    }

    async fn add<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.add_route(self).await
    }

    async fn delete<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.del_route(self).await
    }
}

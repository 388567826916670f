use crate::desired::RuleSpec;
use crate::kernel::Kernel;
use crate::netlink::Result;

use super::Resource;

impl Resource for RuleSpec {
    const KIND: &'static str = "rule";

    fn matches(&self, other: &Self) -> bool {
        RuleSpec::matches(self, other)
    }

    fn table(&self) -> Option<u32> {
        Some(self.table)
    }

    /// `from all` rules such as the kernel's own `lookup main` are never
    /// purged by hard-sync.
    fn purgeable(&self) -> bool {
        self.source.prefix_len() != 0
    }

    async fn list<K: Kernel>(kernel: &K, table: Option<u32>) -> Result<Vec<Self>> {
        let rules = kernel.rules().await?;
        Ok(rules
            .into_iter()
            .filter(|r| table.is_none_or(|t| r.table == t))
            .collect())
    }

    async fn add<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.add_rule(self).await
    }

    async fn delete<K: Kernel>(&self, kernel: &K) -> Result<()> {
        kernel.del_rule(self).await
    }
}

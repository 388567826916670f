//! Boot-time persistence: a replay script for `networkd-dispatcher`.
//!
//! The script re-creates the current snapshot with `ip` commands and
//! guards itself with a lock file, so it runs once per boot even though
//! the dispatcher fires every time a link becomes routable.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::desired::{Config, RouteSpec, VlanSpec};
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::netlink::types::route::rtnh_f;
use crate::util::names;

/// Default script location.
pub const DEFAULT_PATH: &str = "/etc/networkd-dispatcher/routable.d/00-ipruler";
/// Default lock file checked by the script.
pub const DEFAULT_LOCK_PATH: &str = "/var/run/networkd-dispatcher-routable.lock";

/// Renders and writes the replay script.
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    path: PathBuf,
    lock_path: PathBuf,
}

impl Default for ScriptWriter {
    fn default() -> Self {
        Self::new(DEFAULT_PATH, DEFAULT_LOCK_PATH)
    }
}

impl ScriptWriter {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Render `config` as a bash script. `link_names` maps link indexes to
    /// interface names.
    pub fn render(&self, config: &Config, link_names: &HashMap<u32, String>) -> String {
        let mut script = format!(
            "#!/bin/bash\n\
             LOCK_FILE=\"{}\"\n\
             \n\
             if [ -f \"$LOCK_FILE\" ]; then\n\
             \techo \"Script already executed once. Exiting.\"\n\
             \texit 0\n\
             fi\n\
             \n",
            self.lock_path.display()
        );

        for vlan in &config.vlans {
            match vlan_command(vlan, link_names) {
                Some(line) => {
                    script.push_str(&line);
                    script.push('\n');
                }
                None => warn!(vlan = %vlan, "parent link unknown, not persisted"),
            }
        }
        for route in &config.routes {
            script.push_str(&route_command(route, link_names));
            script.push('\n');
        }
        for rule in &config.rules {
            let _ = writeln!(script, "ip rule add from {} table {}", rule.source, rule.table);
        }

        script.push_str("\ntouch $LOCK_FILE\necho \"Script executed and lock file created.\"\n");
        script
    }

    /// Write the script for `config`, resolving link names through `kernel`.
    pub async fn write<K: Kernel>(&self, config: &Config, kernel: &K) -> Result<PathBuf> {
        let link_names: HashMap<u32, String> = kernel
            .links()
            .await
            .map_err(|e| Error::kernel("list links", e))?
            .into_iter()
            .map(|l| (l.index, l.name))
            .collect();

        let script = self.render(config, &link_names);
        let io_err = |source| Error::Persistence {
            path: self.path.clone(),
            source,
        };

        tokio::fs::write(&self.path, script).await.map_err(io_err)?;
        tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(io_err)?;

        info!(path = %self.path.display(), "persisted configuration");
        Ok(self.path.clone())
    }
}

fn vlan_command(vlan: &VlanSpec, link_names: &HashMap<u32, String>) -> Option<String> {
    let parent = link_names.get(&vlan.parent)?;
    let mut line = format!(
        "ip link add link {} name {} type vlan id {} protocol {}",
        parent,
        vlan.name,
        vlan.id,
        names::vlan_protocol_name(vlan.protocol)
    );
    if let Some(mtu) = vlan.mtu {
        let _ = write!(line, " mtu {}", mtu);
    }
    if let Some(qlen) = vlan.txqlen {
        let _ = write!(line, " txqueuelen {}", qlen);
    }
    let _ = write!(line, "; ip link set {} up", vlan.name);
    Some(line)
}

fn route_command(route: &RouteSpec, link_names: &HashMap<u32, String>) -> String {
    let mut line = String::from("ip route add to ");
    if route.is_default() {
        line.push_str("default");
    } else {
        let _ = write!(line, "{}", route.destination);
    }
    if let Some(gw) = route.gateway {
        let _ = write!(line, " via {}", gw);
    }
    let _ = write!(line, " table {}", route.table);
    // The kernel finds the device from the gateway when it is missing.
    if let Some(dev) = link_names.get(&route.oif) {
        let _ = write!(line, " dev {}", dev);
    }
    let _ = write!(
        line,
        " proto {} scope {}",
        names::route_protocol_name(route.protocol),
        names::route_scope_name(route.scope)
    );
    for flag in [rtnh_f::ONLINK, rtnh_f::PERVASIVE] {
        if route.flags & flag != 0 {
            let _ = write!(line, " {}", names::route_flag_name(flag));
        }
    }
    line
}

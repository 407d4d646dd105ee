use std::net::IpAddr;

use tracing::{info, warn};

use crate::config::SnatConfig;
use crate::error::KernelError;
use crate::selector::ExitAddress;

/// Installs and tears down the per-exit fwmark routing tables and iptables
/// SNAT rules (spec §4.5). Linux-only; on other targets `setup`/`teardown`
/// are no-ops so the rest of the orchestrator never needs a platform
/// `cfg` of its own.
pub struct SnatController {
    #[cfg(target_os = "linux")]
    cfg: SnatConfig,
    #[cfg(target_os = "linux")]
    installed: Vec<(u32, u32, IpAddr)>,
}

impl SnatController {
    pub fn new(_cfg: SnatConfig) -> Self {
        #[cfg(target_os = "linux")]
        {
            Self { cfg: _cfg, installed: Vec::new() }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Self {}
        }
    }

    #[cfg(target_os = "linux")]
    pub async fn setup(&mut self, exits: &[ExitAddress]) -> Result<(), KernelError> {
        if !self.cfg.enabled {
            return Ok(());
        }
        let gateway = self
            .cfg
            .gateway
            .ok_or_else(|| KernelError::CommandFailed {
                command: "ip route add".into(),
                detail: "no gateway configured".into(),
            })?;

        let (connection, handle, _) = rtnetlink::new_connection()
            .map_err(|e| KernelError::Netlink(e.to_string()))?;
        tokio::spawn(connection);

        for exit in exits {
            if let Err(e) = self.install_route(&handle, exit, gateway).await {
                warn!(address = %exit.address, error = %e, "route already present or setup failed");
            }
            if let Err(e) = self.install_rule(&handle, exit).await {
                warn!(address = %exit.address, error = %e, "ip rule already present or setup failed");
            }
            self.install_iptables(exit)?;
            self.installed.push((exit.mark, exit.table, exit.address));
        }
        info!(count = exits.len(), "SNAT controller installed routing for exit addresses");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    async fn install_route(
        &self,
        handle: &rtnetlink::Handle,
        exit: &ExitAddress,
        gateway: IpAddr,
    ) -> Result<(), KernelError> {
        match (gateway, exit.address) {
            (IpAddr::V4(gw), IpAddr::V4(src)) => handle
                .route()
                .add()
                .v4()
                .table_id(exit.table)
                .gateway(gw)
                .source_prefix(src, 32)
                .execute()
                .await
                .map_err(|e| KernelError::Netlink(e.to_string())),
            (IpAddr::V6(gw), IpAddr::V6(src)) => handle
                .route()
                .add()
                .v6()
                .table_id(exit.table)
                .gateway(gw)
                .source_prefix(src, 128)
                .execute()
                .await
                .map_err(|e| KernelError::Netlink(e.to_string())),
            _ => Err(KernelError::CommandFailed {
                command: "ip route add".into(),
                detail: "gateway and exit address families differ".into(),
            }),
        }
    }

    #[cfg(target_os = "linux")]
    async fn install_rule(&self, handle: &rtnetlink::Handle, exit: &ExitAddress) -> Result<(), KernelError> {
        handle
            .rule()
            .add()
            .fw_mark(exit.mark)
            .table_id(exit.table)
            .execute()
            .await
            .map_err(|e| KernelError::Netlink(e.to_string()))
    }

    #[cfg(target_os = "linux")]
    fn install_iptables(&self, exit: &ExitAddress) -> Result<(), KernelError> {
        let ipt = iptables::new(false).map_err(|e| KernelError::CommandFailed {
            command: "iptables".into(),
            detail: e.to_string(),
        })?;
        let rule = format!(
            "-m mark --mark {} -j SNAT --to-source {}",
            exit.mark, exit.address
        );
        ipt.append_unique("nat", "OUTPUT", &rule).map_err(|e| KernelError::CommandFailed {
            command: "iptables -t nat -A OUTPUT".into(),
            detail: e.to_string(),
        })?;
        Ok(())
    }

    /// Remove every rule this controller installed. Failures are logged,
    /// never returned, so teardown never blocks process shutdown.
    #[cfg(target_os = "linux")]
    pub async fn teardown(&mut self) {
        if self.installed.is_empty() {
            return;
        }
        let connection_result = rtnetlink::new_connection();
        let Ok((connection, handle, _)) = connection_result else {
            warn!("SNAT teardown: could not open netlink connection");
            return;
        };
        tokio::spawn(connection);

        for (mark, table, address) in self.installed.drain(..) {
            if let Err(e) = remove_rule(&handle, mark, table).await {
                warn!(mark, table, "failed to remove ip rule: {e}");
            }
            if let Err(e) = remove_route(&handle, table).await {
                warn!(table, "failed to remove route: {e}");
            }
            if let Ok(ipt) = iptables::new(false) {
                let rule = format!("-m mark --mark {mark} -j SNAT --to-source {address}");
                if let Err(e) = ipt.delete("nat", "OUTPUT", &rule) {
                    warn!(mark, "failed to remove iptables SNAT rule: {e}");
                }
            }
        }
        info!("SNAT controller teardown complete");
    }

    #[cfg(not(target_os = "linux"))]
    pub async fn setup(&mut self, _exits: &[ExitAddress]) -> Result<(), KernelError> {
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub async fn teardown(&mut self) {}
}

#[cfg(target_os = "linux")]
async fn remove_rule(handle: &rtnetlink::Handle, mark: u32, table: u32) -> Result<(), String> {
    use futures::TryStreamExt;
    let mut rules = handle.rule().get().execute();
    while let Some(rule) = rules.try_next().await.map_err(|e| e.to_string())? {
        if rule.attributes.iter().any(|a| matches!(a, rtnetlink::packet_route::rule::RuleAttribute::FwMark(m) if *m == mark)) {
            handle.rule().del(rule).execute().await.map_err(|e| e.to_string())?;
        }
    }
    let _ = table;
    Ok(())
}

#[cfg(target_os = "linux")]
async fn remove_route(handle: &rtnetlink::Handle, table: u32) -> Result<(), String> {
    use futures::TryStreamExt;
    let mut routes = handle.route().get(rtnetlink::IpVersion::V4).execute();
    while let Some(route) = routes.try_next().await.map_err(|e| e.to_string())? {
        if route.header.table as u32 == table {
            handle.route().del(route).execute().await.map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
